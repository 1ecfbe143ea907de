/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled templates.
//!
//! A [`TemplateAst`] is a shared handle on a set-once slot. Partials are
//! registered in the repository before their body compiles, as an undefined
//! AST, so that a partial can include itself. The slot is defined when the
//! compilation completes, and never changes afterwards.

use crate::expression::Expression;
use crate::generator::TemplateGenerator;
use crate::rendering::ContentType;
use crate::tag::Tag;
use std::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
struct DefinedAst {
    nodes: Vec<TemplateAstNode>,
    content_type: ContentType,
}

#[derive(Clone)]
pub struct TemplateAst {
    slot: Arc<OnceLock<DefinedAst>>,
}

impl TemplateAst {
    /// A placeholder for an AST whose compilation is in progress.
    pub(crate) fn undefined() -> Self {
        Self {
            slot: Arc::new(OnceLock::new()),
        }
    }

    pub fn new(nodes: Vec<TemplateAstNode>, content_type: ContentType) -> Self {
        let ast = Self::undefined();
        ast.define(nodes, content_type);
        ast
    }

    pub fn is_defined(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The nodes of a defined AST. Undefined ASTs have no nodes.
    pub fn nodes(&self) -> &[TemplateAstNode] {
        self.slot.get().map(|ast| ast.nodes.as_slice()).unwrap_or(&[])
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.slot.get().map(|ast| ast.content_type)
    }

    /// Fill the slot. Returns false if it was already defined.
    pub(crate) fn define(&self, nodes: Vec<TemplateAstNode>, content_type: ContentType) -> bool {
        self.slot
            .set(DefinedAst {
                nodes,
                content_type,
            })
            .is_ok()
    }

    /// True when both handles share the same slot.
    pub fn ptr_eq(&self, other: &TemplateAst) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for TemplateAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_defined() {
            return f.write_str("TemplateAST(undefined)");
        }
        let source = TemplateGenerator::default().string_from(self);
        write!(f, "TemplateAST({:?})", source)
    }
}

/// `{{$name}}...{{/name}}`: a region that partial overrides may replace.
#[derive(Debug, Clone)]
pub struct Block {
    pub inner_ast: TemplateAst,
    pub name: String,
}

/// `{{<name}}...{{/name}}`: renders `parent`, with the blocks of `child_ast`
/// overriding the blocks of the parent.
#[derive(Debug, Clone)]
pub struct PartialOverride {
    pub child_ast: TemplateAst,
    pub parent: Partial,
}

/// `{{>name}}`. The name is absent for partials built at render time, such
/// as templates rendered as sections.
#[derive(Debug, Clone)]
pub struct Partial {
    pub ast: TemplateAst,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub tag: Tag,
    pub expression: Expression,
    pub inverted: bool,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub tag: Tag,
    pub expression: Expression,
    pub escapes_html: bool,
}

#[derive(Debug, Clone)]
pub enum TemplateAstNode {
    Block(Block),
    PartialOverride(PartialOverride),
    Partial(Partial),
    Section(Section),
    Text(String),
    Variable(Variable),
}

impl TemplateAstNode {
    pub fn block(inner_ast: TemplateAst, name: impl Into<String>) -> Self {
        TemplateAstNode::Block(Block {
            inner_ast,
            name: name.into(),
        })
    }

    pub fn partial_override(child_ast: TemplateAst, parent_ast: TemplateAst, parent_name: Option<String>) -> Self {
        TemplateAstNode::PartialOverride(PartialOverride {
            child_ast,
            parent: Partial {
                ast: parent_ast,
                name: parent_name,
            },
        })
    }

    pub fn partial(ast: TemplateAst, name: Option<String>) -> Self {
        TemplateAstNode::Partial(Partial { ast, name })
    }

    pub fn text(text: impl Into<String>) -> Self {
        TemplateAstNode::Text(text.into())
    }
}
