/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled templates.

use crate::ast::{TemplateAst, TemplateAstNode};
use crate::boxable::MustacheBoxable;
use crate::context::Context;
use crate::error::{MustacheError, MustacheResult};
use crate::evaluator::RenderingEngine;
use crate::generator::TemplateGenerator;
use crate::mustache_box::{MustacheBox, RenderFn, RenderingInfo};
use crate::rendering::{ContentType, Rendering};
use crate::repository::TemplateRepository;
use crate::resolver::FileSystemResolver;
use crate::tag::TagType;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A compiled template, ready to render.
///
/// ```ignore
/// let template = Template::from_string("Hello {{name}}!")?;
/// let rendered = template.render(serde_json::json!({ "name": "Arthur" }))?;
/// assert_eq!(rendered, "Hello Arthur!");
/// ```
#[derive(Clone)]
pub struct Template {
    repository: TemplateRepository,
    ast: TemplateAst,
    base_context: Context,
}

impl Template {
    pub(crate) fn new(repository: TemplateRepository, ast: TemplateAst, base_context: Context) -> Self {
        Self {
            repository,
            ast,
            base_context,
        }
    }

    /// Compile a template string. Partial tags fail, since the template has
    /// no data source.
    pub fn from_string(template_string: &str) -> MustacheResult<Template> {
        TemplateRepository::new().template_from_string(template_string)
    }

    /// Load a template file. Partial tags load sibling files with the same
    /// extension: `{{>footer}}` in `/path/page.html` loads
    /// `/path/footer.html`.
    pub fn from_path(path: impl AsRef<Path>) -> MustacheResult<Template> {
        let path = path.as_ref();
        let (Some(directory), Some(name)) = (path.parent(), path.file_stem()) else {
            return Err(MustacheError::not_found(format!("Template not found: \"{}\"", path.display())).into());
        };
        let extension = path.extension().map(|extension| extension.to_string_lossy());
        let resolver = FileSystemResolver::new(directory).with_extension(extension.as_deref());
        TemplateRepository::with_resolver(resolver).template_named(&name.to_string_lossy())
    }

    /// Render with `value` on top of the base context.
    pub fn render(&self, value: impl MustacheBoxable) -> MustacheResult<String> {
        let rendering = self.render_context(&self.base_context.extended_context(value))?;
        Ok(rendering.string)
    }

    /// Render in the given context. The rendering carries the content type
    /// of the template, for render functions that compose templates.
    pub fn render_context(&self, context: &Context) -> MustacheResult<Rendering> {
        RenderingEngine::new(context.clone()).render(&self.ast)
    }

    pub fn content_type(&self) -> ContentType {
        self.ast.content_type().unwrap_or_default()
    }

    pub fn repository(&self) -> &TemplateRepository {
        &self.repository
    }

    pub fn base_context(&self) -> &Context {
        &self.base_context
    }

    pub fn set_base_context(&mut self, context: Context) {
        self.base_context = context;
    }

    pub fn extend_base_context(&mut self, value: impl MustacheBoxable) {
        self.base_context = self.base_context.extended_context(value);
    }

    /// Make `key` resolve to `value` in every rendering, whatever the
    /// rendered data contains.
    pub fn register_in_base_context(&mut self, key: &str, value: impl MustacheBoxable) {
        self.base_context = self.base_context.context_with_registered_key(key, value);
    }

    pub fn debug_description(&self) -> String {
        format!("Template({:?})", TemplateGenerator::default().string_from(&self.ast))
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug_description())
    }
}

/// `{{template}}` renders like the partial `{{>template}}`, and
/// `{{#template}}...{{/template}}` like the partial override
/// `{{<template}}...{{/template}}`.
impl MustacheBoxable for Template {
    fn mustache_box(&self) -> MustacheBox {
        let template = self.clone();
        let render: RenderFn = Arc::new(move |info: &RenderingInfo<'_>| match info.tag.tag_type() {
            TagType::Variable => template.render_context(&info.context),
            TagType::Section => {
                let child_ast = info.tag.inner_template_ast().cloned().unwrap_or_else(|| {
                    TemplateAst::new(Vec::new(), template.content_type())
                });
                let node = TemplateAstNode::partial_override(child_ast, template.ast.clone(), None);
                let ast = TemplateAst::new(vec![node], template.content_type());
                RenderingEngine::new(info.context.clone()).render(&ast)
            }
        });
        MustacheBox::builder()
            .value(TemplateValue(self.debug_description()))
            .render(render)
            .build()
    }
}

/// The value of a boxed template, shown in debug descriptions.
struct TemplateValue(String);

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_render() {
        let template = Template::from_string("Hello {{name}}!").unwrap();
        assert_eq!(template.render(json!({ "name": "Arthur" })).unwrap(), "Hello Arthur!");
        assert_eq!(template.render(()).unwrap(), "Hello !");
    }

    #[test]
    fn test_render_context_carries_content_type() {
        let template = Template::from_string("{{%CONTENT_TYPE:TEXT}}<{{x}}>").unwrap();
        let rendering = template
            .render_context(&Context::with_box(json!({ "x": "&" })))
            .unwrap();
        assert_eq!(rendering, Rendering::text("<&>"));
        assert_eq!(template.content_type(), ContentType::Text);
    }

    #[test]
    fn test_partial_without_data_source_fails() {
        let error = Template::from_string("{{>partial}}").unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::TemplateNotFound));
    }

    #[test]
    fn test_base_context() {
        let mut template = Template::from_string("{{greeting}} {{name}}").unwrap();
        template.extend_base_context(json!({ "greeting": "Hi", "name": "base" }));
        assert_eq!(template.render(json!({ "name": "data" })).unwrap(), "Hi data");

        template.register_in_base_context("name", "registered");
        assert_eq!(template.render(json!({ "name": "data" })).unwrap(), "Hi registered");

        template.set_base_context(Context::new());
        assert_eq!(template.render(()).unwrap(), " ");
    }

    #[test]
    fn test_from_path_loads_sibling_partials() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("page.html"), "<body>{{>footer}}</body>").unwrap();
        fs::write(dir.path().join("footer.html"), "<p>{{year}}</p>").unwrap();
        fs::write(dir.path().join("footer.mustache"), "wrong").unwrap();
        let template = Template::from_path(dir.path().join("page.html")).unwrap();
        assert_eq!(
            template.render(json!({ "year": 2025 })).unwrap(),
            "<body><p>2025</p></body>"
        );
    }

    #[test]
    fn test_template_as_variable_renders_like_a_partial() {
        let link = Template::from_string("<a href='{{url}}'>{{name}}</a>").unwrap();
        let data = HashMap::from([
            ("link".to_string(), crate::boxed(&link)),
            ("url".to_string(), crate::boxed("/people/123")),
            ("name".to_string(), crate::boxed("Salvador")),
        ]);
        let template = Template::from_string("{{link}}").unwrap();
        assert_eq!(template.render(&data).unwrap(), "<a href='/people/123'>Salvador</a>");
    }

    #[test]
    fn test_text_template_is_escaped_in_html() {
        let text = Template::from_string("{{%CONTENT_TYPE:TEXT}}<{{x}}>").unwrap();
        let data = HashMap::from([
            ("text".to_string(), crate::boxed(&text)),
            ("x".to_string(), crate::boxed("&")),
        ]);
        let template = Template::from_string("{{text}} {{{text}}}").unwrap();
        assert_eq!(template.render(&data).unwrap(), "&lt;&amp;&gt; <&>");
    }

    #[test]
    fn test_template_as_section_overrides_blocks() {
        let layout = Template::from_string("<h1>{{$title}}Default{{/title}}</h1>").unwrap();
        let data = HashMap::from([("layout".to_string(), crate::boxed(&layout))]);
        let template = Template::from_string("{{#layout}}{{$title}}Custom{{/title}}{{/layout}}|{{#layout}}{{/layout}}").unwrap();
        assert_eq!(template.render(&data).unwrap(), "<h1>Custom</h1>|<h1>Default</h1>");
    }

    #[test]
    fn test_debug_description() {
        let template = Template::from_string("{{=<% %>=}}a<%#b%><%&c%><%/b%>").unwrap();
        assert_eq!(template.debug_description(), r#"Template("a{{#b}}{{{c}}}{{/b}}")"#);
    }
}
