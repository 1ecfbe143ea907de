/*
 * rendering.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Content types and content-typed renderings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The content type of a template or of a rendering.
///
/// HTML templates escape Text renderings emitted by `{{name}}` tags. Text
/// templates never escape anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    #[default]
    Html,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Text => write!(f, "Text"),
            ContentType::Html => write!(f, "HTML"),
        }
    }
}

/// A rendered string together with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendering {
    pub string: String,
    pub content_type: ContentType,
}

impl Rendering {
    pub fn new(string: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            string: string.into(),
            content_type,
        }
    }

    /// A Text rendering, the default for values rendered by variable tags.
    pub fn text(string: impl Into<String>) -> Self {
        Self::new(string, ContentType::Text)
    }

    pub fn html(string: impl Into<String>) -> Self {
        Self::new(string, ContentType::Html)
    }

    /// Debugging form, e.g. `Rendering(Text:"foo")`.
    pub fn debug_description(&self) -> String {
        format!("Rendering({}:{:?})", self.content_type, self.string)
    }
}

/// Escape the characters that are significant in HTML.
pub fn escape_html(string: &str) -> String {
    let mut escaped = String::with_capacity(string.len());
    for c in string.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
