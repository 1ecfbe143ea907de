/*
 * configuration.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Settings that affect the compilation and rendering of templates.
//!
//! A [`TemplateRepository`](crate::TemplateRepository) holds a
//! configuration and applies it to every template it compiles. The
//! repository takes a snapshot the first time it compiles a template, so
//! configure it before loading anything.

use crate::boxable::MustacheBoxable;
use crate::context::Context;
use crate::error::MustacheResult;
use crate::rendering::ContentType;
use crate::tag::TagDelimiterPair;
use serde::Deserialize;
use std::fmt;

#[derive(Clone)]
pub struct Configuration {
    /// Content type of templates that do not declare one with a
    /// `CONTENT_TYPE` pragma.
    pub content_type: ContentType,

    /// Context that every rendering starts from.
    pub base_context: Context,

    /// Delimiters used by the parser and the template generator.
    pub tag_delimiter_pair: TagDelimiterPair,

    /// Fail on identifiers that resolve to nothing instead of rendering
    /// them as empty.
    pub throw_when_missing: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            content_type: ContentType::Html,
            base_context: Context::new(),
            tag_delimiter_pair: ("{{".to_string(), "}}".to_string()),
            throw_when_missing: false,
        }
    }
}

/// The serializable subset of a configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigurationDocument {
    content_type: ContentType,
    tag_delimiters: (String, String),
    throw_when_missing: bool,
}

impl Default for ConfigurationDocument {
    fn default() -> Self {
        let defaults = Configuration::default();
        Self {
            content_type: defaults.content_type,
            tag_delimiters: defaults.tag_delimiter_pair,
            throw_when_missing: defaults.throw_when_missing,
        }
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a configuration from JSON. Missing fields keep their default
    /// values; the base context is always empty.
    ///
    /// ```ignore
    /// let configuration = Configuration::from_json(r#"{"content_type": "text"}"#)?;
    /// ```
    pub fn from_json(json: &str) -> MustacheResult<Self> {
        let document: ConfigurationDocument = serde_json::from_str(json)?;
        Ok(Self {
            content_type: document.content_type,
            tag_delimiter_pair: document.tag_delimiters,
            throw_when_missing: document.throw_when_missing,
            ..Self::default()
        })
    }

    pub fn extend_base_context(&mut self, value: impl MustacheBoxable) {
        self.base_context = self.base_context.extended_context(value);
    }

    pub fn register_in_base_context(&mut self, key: &str, value: impl MustacheBoxable) {
        self.base_context = self.base_context.context_with_registered_key(key, value);
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("content_type", &self.content_type)
            .field("base_context", &self.base_context)
            .field("tag_delimiter_pair", &self.tag_delimiter_pair)
            .field("throw_when_missing", &self.throw_when_missing)
            .finish()
    }
}
