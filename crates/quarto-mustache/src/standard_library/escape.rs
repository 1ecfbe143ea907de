/*
 * standard_library/escape.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Escaping helpers.
//!
//! Each helper works two ways. As a filter, `{{ URLEscape(x) }}` escapes the
//! rendering of its argument. As a section, `{{#URLEscape}}...{{/URLEscape}}`
//! escapes every variable tag inside.

use crate::filter::rendering_filter;
use crate::mustache_box::{MustacheBox, RenderingInfo, WillRenderFn};
use crate::rendering::{Rendering, escape_html};
use crate::tag::{Tag, TagType};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;
use std::sync::Arc;

/// Characters left as is in URL query values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'$')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b'-')
    .remove(b'.')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'@')
    .remove(b'_')
    .remove(b'~');

pub fn escape_url(string: &str) -> String {
    utf8_percent_encode(string, QUERY_VALUE).to_string()
}

pub fn escape_javascript(string: &str) -> String {
    let mut escaped = String::with_capacity(string.len());
    for c in string.chars() {
        match c {
            '\u{0}'..='\u{1F}' | '\\' | '\'' | '"' | '<' | '>' | '&' | '=' | '-' | ';' | '\u{2028}'
            | '\u{2029}' => escaped.push_str(&format!("\\u{:04X}", c as u32)),
            _ => escaped.push(c),
        }
    }
    escaped
}

struct HelperName(&'static str);

impl fmt::Display for HelperName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub(crate) fn escape_helper(name: &'static str, escape: fn(&str) -> String) -> MustacheBox {
    let will_render: WillRenderFn = Arc::new(move |tag: &Tag, mbox: MustacheBox| match tag.tag_type() {
        TagType::Variable => MustacheBox::from_render(Arc::new(move |info: &RenderingInfo<'_>| {
            let rendering = mbox.render(info)?;
            Ok(Rendering::new(escape(&rendering.string), rendering.content_type))
        })),
        TagType::Section => mbox,
    });
    MustacheBox::builder()
        .value(HelperName(name))
        .filter(rendering_filter(move |rendering| {
            Ok(Rendering::new(escape(&rendering.string), rendering.content_type))
        }))
        .will_render(will_render)
        .build()
}

pub(crate) fn html_escape() -> MustacheBox {
    escape_helper("HTMLEscape", escape_html)
}

pub(crate) fn url_escape() -> MustacheBox {
    escape_helper("URLEscape", escape_url)
}

pub(crate) fn javascript_escape() -> MustacheBox {
    escape_helper("javascriptEscape", escape_javascript)
}
