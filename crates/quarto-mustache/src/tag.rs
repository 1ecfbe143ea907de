/*
 * tag.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tags as seen by render functions.

use crate::ast::TemplateAst;
use crate::context::Context;
use crate::error::MustacheResult;
use crate::evaluator::RenderingEngine;
use crate::rendering::{ContentType, Rendering};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    /// `{{name}}`, `{{{name}}}` and `{{&name}}`
    Variable,
    /// `{{#name}}...{{/name}}` and `{{^name}}...{{/name}}`
    Section,
}

/// An opening and closing delimiter, e.g. `("{{", "}}")`.
pub type TagDelimiterPair = (String, String);

#[derive(Clone)]
enum TagBody {
    Variable {
        content_type: ContentType,
    },
    Section {
        inner_ast: TemplateAst,
        inner_template_string: Arc<str>,
    },
}

/// A variable or section tag, with its source location.
#[derive(Clone)]
pub struct Tag {
    body: TagBody,
    source: Arc<str>,
    template_id: Option<String>,
    line_number: usize,
    tag_delimiter_pair: TagDelimiterPair,
}

impl Tag {
    pub(crate) fn variable(
        content_type: ContentType,
        source: Arc<str>,
        template_id: Option<String>,
        line_number: usize,
        tag_delimiter_pair: TagDelimiterPair,
    ) -> Self {
        Self {
            body: TagBody::Variable { content_type },
            source,
            template_id,
            line_number,
            tag_delimiter_pair,
        }
    }

    pub(crate) fn section(
        inner_ast: TemplateAst,
        inner_template_string: Arc<str>,
        source: Arc<str>,
        template_id: Option<String>,
        line_number: usize,
        tag_delimiter_pair: TagDelimiterPair,
    ) -> Self {
        Self {
            body: TagBody::Section {
                inner_ast,
                inner_template_string,
            },
            source,
            template_id,
            line_number,
            tag_delimiter_pair,
        }
    }

    pub fn tag_type(&self) -> TagType {
        match self.body {
            TagBody::Variable { .. } => TagType::Variable,
            TagBody::Section { .. } => TagType::Section,
        }
    }

    /// The literal source between the opening and closing tags of a section.
    /// Empty for variable tags.
    pub fn inner_template_string(&self) -> &str {
        match &self.body {
            TagBody::Variable { .. } => "",
            TagBody::Section {
                inner_template_string,
                ..
            } => inner_template_string,
        }
    }

    /// The delimiters that were active when the tag was parsed.
    pub fn tag_delimiter_pair(&self) -> &TagDelimiterPair {
        &self.tag_delimiter_pair
    }

    pub fn template_id(&self) -> Option<&str> {
        self.template_id.as_deref()
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// The tag as written in the template, e.g. `{{#items}}`.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn inner_template_ast(&self) -> Option<&TemplateAst> {
        match &self.body {
            TagBody::Variable { .. } => None,
            TagBody::Section { inner_ast, .. } => Some(inner_ast),
        }
    }

    /// Render the content of the tag in the given context.
    ///
    /// Sections render their inner template. Variable tags have no content,
    /// and render an empty string of the template's content type.
    pub fn render(&self, context: &Context) -> MustacheResult<Rendering> {
        match &self.body {
            TagBody::Variable { content_type } => Ok(Rendering::new("", *content_type)),
            TagBody::Section { inner_ast, .. } => {
                RenderingEngine::new(context.clone()).render(inner_ast)
            }
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.template_id {
            Some(id) => write!(
                f,
                "{} at line {} of template {}",
                self.source, self.line_number, id
            ),
            None => write!(f, "{} at line {}", self.source, self.line_number),
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}
