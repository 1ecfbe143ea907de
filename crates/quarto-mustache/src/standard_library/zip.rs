/*
 * standard_library/zip.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The `zip` filter: `{{#zip(a, b)}}...{{/zip(a, b)}}` renders once per row,
//! with the items of row `n` pushed on the context stack in argument order.
//! Rows continue until the longest argument is exhausted.

use crate::error::MustacheError;
use crate::filter::variadic_filter;
use crate::mustache_box::{FilterFn, MustacheBox, RenderFn, RenderingInfo};
use std::sync::Arc;

pub(crate) fn zip_filter() -> FilterFn {
    variadic_filter(|arguments| {
        let mut columns: Vec<&[MustacheBox]> = Vec::new();
        for argument in arguments {
            if argument.is_empty() {
                continue;
            }
            let Some(items) = argument.array_value() else {
                return Err(MustacheError::render(format!(
                    "Non-enumerable argument in zip filter: `{}`",
                    argument.value_description()
                ))
                .into());
            };
            columns.push(items);
        }

        let row_count = columns.iter().map(|column| column.len()).max().unwrap_or(0);
        let rows = (0..row_count)
            .map(|row| {
                let boxes: Vec<MustacheBox> = columns
                    .iter()
                    .filter_map(|column| column.get(row).cloned())
                    .collect();
                let render: RenderFn = Arc::new(move |info: &RenderingInfo<'_>| {
                    let context = boxes
                        .iter()
                        .fold(info.context.clone(), |context, mbox| context.extended_context(mbox));
                    info.tag.render(&context)
                });
                MustacheBox::from_render(render)
            })
            .collect();
        Ok(MustacheBox::from_array(rows))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Template;
    use serde_json::json;

    fn render(source: &str, data: serde_json::Value) -> crate::MustacheResult<String> {
        let mut template = Template::from_string(source)?;
        template.register_in_base_context("zip", zip_filter());
        template.render(data)
    }

    #[test]
    fn test_zip_pushes_rows_in_order() {
        let data = json!({
            "users": [{ "name": "alice" }, { "name": "bob" }],
            "teams": [{ "team": "red", "name": "team-red" }, { "team": "blue" }],
        });
        assert_eq!(
            render("{{#zip(users, teams)}}{{name}}/{{team}} {{/zip(users, teams)}}", data).unwrap(),
            "team-red/red bob/blue "
        );
    }

    #[test]
    fn test_zip_uneven_and_missing_arguments() {
        let data = json!({ "a": [1, 2, 3], "b": ["x"] });
        assert_eq!(
            render("{{#zip(a, missing, b)}}<{{.}}>{{/zip(a, missing, b)}}", data).unwrap(),
            "<x><2><3>"
        );
    }

    #[test]
    fn test_zip_without_rows() {
        assert_eq!(render("[{{#zip(a)}}x{{/zip(a)}}]", json!({ "a": [] })).unwrap(), "[]");
    }

    #[test]
    fn test_zip_rejects_scalars() {
        let error = render("{{#zip(a, s)}}{{/zip(a, s)}}", json!({ "a": [1], "s": "str" })).unwrap_err();
        assert!(
            error
                .to_string()
                .ends_with("Non-enumerable argument in zip filter: `\"str\"`"),
            "{}",
            error
        );
    }
}
