/*
 * standard_library/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Filters and helpers that templates commonly need.
//!
//! | Key                | Usage                                               |
//! |--------------------|-----------------------------------------------------|
//! | `HTMLEscape`       | `{{HTMLEscape(x)}}` or `{{#HTMLEscape}}...{{/}}`    |
//! | `URLEscape`        | `{{URLEscape(x)}}` or `{{#URLEscape}}...{{/}}`      |
//! | `javascriptEscape` | `{{javascriptEscape(x)}}` or as a section           |
//! | `each`             | `{{#each(items)}}{{@index}}{{/}}`                   |
//! | `zip`              | `{{#zip(a, b)}}...{{/}}`                            |
//!
//! [`Logger`] is not registered by default: push it on the context stack
//! to trace renderings.

mod each;
mod escape;
mod logger;
mod zip;

pub use escape::{escape_javascript, escape_url};
pub use logger::Logger;

use crate::configuration::Configuration;
use crate::mustache_box::MustacheBox;
use crate::template::Template;

pub struct StandardLibrary;

impl StandardLibrary {
    pub fn html_escape() -> MustacheBox {
        escape::html_escape()
    }

    pub fn url_escape() -> MustacheBox {
        escape::url_escape()
    }

    pub fn javascript_escape() -> MustacheBox {
        escape::javascript_escape()
    }

    pub fn each() -> MustacheBox {
        MustacheBox::from_filter(each::each_filter())
    }

    pub fn zip() -> MustacheBox {
        MustacheBox::from_filter(zip::zip_filter())
    }

    fn entries() -> [(&'static str, MustacheBox); 5] {
        [
            ("HTMLEscape", Self::html_escape()),
            ("URLEscape", Self::url_escape()),
            ("javascriptEscape", Self::javascript_escape()),
            ("each", Self::each()),
            ("zip", Self::zip()),
        ]
    }

    /// Register every helper in the base context of `template`.
    pub fn register(template: &mut Template) {
        for (key, mbox) in Self::entries() {
            template.register_in_base_context(key, mbox);
        }
    }

    /// Register every helper in the base context of `configuration`, for
    /// all templates of a repository.
    pub fn register_in_configuration(configuration: &mut Configuration) {
        for (key, mbox) in Self::entries() {
            configuration.register_in_base_context(key, mbox);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::TemplateRepository;
    use serde_json::json;

    #[test]
    fn test_register() {
        let mut template = Template::from_string(
            "{{#each(items)}}{{URLEscape(.)}}{{^@last}}&{{/@last}}{{/each(items)}}",
        )
        .unwrap();
        StandardLibrary::register(&mut template);
        assert_eq!(
            template.render(json!({ "items": ["a b", "c"] })).unwrap(),
            "a%20b&c"
        );
    }

    #[test]
    fn test_register_in_configuration() {
        let repository = TemplateRepository::new();
        let mut configuration = repository.configuration();
        StandardLibrary::register_in_configuration(&mut configuration);
        repository.set_configuration(configuration);
        let template = repository
            .template_from_string("{{#zip(a, b)}}{{.}}{{/zip(a, b)}}")
            .unwrap();
        assert_eq!(template.render(json!({ "a": [1, 2], "b": [3, 4] })).unwrap(), "34");
    }
}
