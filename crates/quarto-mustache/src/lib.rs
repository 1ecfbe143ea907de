/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Mustache template engine for Quarto.
//!
//! This crate compiles Mustache templates into an immutable AST and renders
//! that AST against a stack of boxed values. It supports:
//!
//! - Variables: `{{name}}` (escaped), `{{{name}}}` and `{{&name}}` (raw)
//! - Sections: `{{#items}}...{{/items}}` and inverted `{{^items}}...{{/items}}`
//! - Dotted and filtered expressions: `{{a.b.c}}`, `{{f(a)}}`, `{{f(a,b)}}`
//! - Partials: `{{>name}}`, including partials that include themselves
//! - Template inheritance: `{{<parent}}{{$block}}...{{/block}}{{/parent}}`
//! - Pragmas: `{{%CONTENT_TYPE:TEXT}}` and `{{%CONTENT_TYPE:HTML}}`
//! - Set-delimiter tags: `{{=<% %>=}}`
//!
//! # Architecture
//!
//! Every host value enters the renderer as a [`MustacheBox`]: a closed value
//! type holding optional capabilities (a value, a keyed subscript, a filter,
//! a custom render function, and will/did-render hooks). Boxes are pushed on
//! an immutable [`Context`] stack. The rendering engine evaluates each tag's
//! [`Expression`] against the context and asks the resulting box to render.
//!
//! Strings carry a [`ContentType`]. Text renderings embedded in HTML
//! templates through escaped variable tags are HTML-escaped.
//!
//! # Example
//!
//! ```ignore
//! use quarto_mustache::Template;
//! use std::collections::HashMap;
//!
//! let template = Template::from_string("Hello {{name}}!")?;
//! let data = HashMap::from([("name".to_string(), "Arthur".to_string())]);
//! assert_eq!(template.render(&data)?, "Hello Arthur!");
//! ```

pub mod ast;
pub mod boxable;
pub mod compiler;
pub mod configuration;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod expression_parser;
pub mod filter;
pub mod generator;
pub mod invocation;
pub mod mustache_box;
pub mod parser;
pub mod rendering;
pub mod repository;
pub mod resolver;
pub mod standard_library;
pub mod tag;
pub mod template;

// Re-export main types at crate root
pub use ast::{Block, Partial, PartialOverride, Section, TemplateAst, TemplateAstNode, Variable};
pub use boxable::{ArrayValue, DictionaryValue, MustacheBoxable, boxed};
pub use configuration::Configuration;
pub use context::Context;
pub use error::{Error, ErrorKind, MustacheError, MustacheResult};
pub use expression::Expression;
pub use expression_parser::ExpressionParser;
pub use filter::{
    double_filter, filter, int_filter, lambda, lambda_variable, render_filter, rendering_filter,
    string_filter, variadic_filter,
};
pub use generator::TemplateGenerator;
pub use invocation::ExpressionInvocation;
pub use mustache_box::{
    BoxBuilder, DidRenderFn, FilterFn, KeyedSubscriptFn, MustacheBox, RenderFn, RenderingInfo,
    WillRenderFn,
};
pub use rendering::{ContentType, Rendering, escape_html};
pub use repository::TemplateRepository;
pub use resolver::{FileSystemResolver, MemoryResolver, TemplateResolver};
pub use standard_library::{Logger, StandardLibrary};
pub use tag::{Tag, TagDelimiterPair, TagType};
pub use template::Template;
