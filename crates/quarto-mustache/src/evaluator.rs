/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template rendering engine.
//!
//! The engine walks a [`TemplateAst`] and appends to a single buffer. For
//! each tag it evaluates the expression, lets the will-render hooks of the
//! context replace the resulting box, asks the box to render, escapes the
//! rendering when a Text rendering lands in an HTML template, then notifies
//! the did-render hooks.
//!
//! A sub-AST whose content type differs from the one being rendered (a Text
//! partial in an HTML template, for instance) is rendered separately and
//! escaped as a whole.

use crate::ast::{Block, Section, TemplateAst, TemplateAstNode, Variable};
use crate::context::Context;
use crate::error::{Error, MustacheError, MustacheResult};
use crate::expression::Expression;
use crate::invocation::ExpressionInvocation;
use crate::mustache_box::{MustacheBox, RenderingInfo};
use crate::rendering::{ContentType, Rendering, escape_html};
use crate::tag::{Tag, TagType};

pub struct RenderingEngine {
    context: Context,
}

impl RenderingEngine {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    /// Render `ast`. The rendering has the content type of the AST.
    pub fn render(&self, ast: &TemplateAst) -> MustacheResult<Rendering> {
        let Some(content_type) = ast.content_type() else {
            return Err(MustacheError::render("Undefined template").into());
        };
        let mut buffer = String::new();
        render_template_ast(ast, &self.context, content_type, &mut buffer)?;
        Ok(Rendering::new(buffer, content_type))
    }
}

fn render_template_ast(
    ast: &TemplateAst,
    context: &Context,
    target_content_type: ContentType,
    buffer: &mut String,
) -> MustacheResult<()> {
    match ast.content_type() {
        Some(content_type) if content_type == target_content_type => {
            for node in ast.nodes() {
                render_node(node, context, target_content_type, buffer)?;
            }
            Ok(())
        }
        _ => {
            let rendering = RenderingEngine::new(context.clone()).render(ast)?;
            if target_content_type == ContentType::Html && rendering.content_type == ContentType::Text {
                buffer.push_str(&escape_html(&rendering.string));
            } else {
                buffer.push_str(&rendering.string);
            }
            Ok(())
        }
    }
}

fn render_node(
    node: &TemplateAstNode,
    context: &Context,
    target_content_type: ContentType,
    buffer: &mut String,
) -> MustacheResult<()> {
    match node {
        TemplateAstNode::Text(text) => {
            buffer.push_str(text);
            Ok(())
        }

        TemplateAstNode::Block(block) => {
            let ast = resolve_block(block, context);
            render_template_ast(&ast, context, target_content_type, buffer)
        }

        TemplateAstNode::PartialOverride(partial_override) => {
            let context = context.extended_with_partial_override(partial_override.clone());
            render_template_ast(&partial_override.parent.ast, &context, target_content_type, buffer)
        }

        TemplateAstNode::Partial(partial) => render_template_ast(&partial.ast, context, target_content_type, buffer),

        TemplateAstNode::Section(Section {
            tag,
            expression,
            inverted,
        }) => render_tag(tag, expression, true, *inverted, context, target_content_type, buffer),

        TemplateAstNode::Variable(Variable {
            tag,
            expression,
            escapes_html,
        }) => render_tag(tag, expression, *escapes_html, false, context, target_content_type, buffer),
    }
}

fn render_tag(
    tag: &Tag,
    expression: &Expression,
    escapes_html: bool,
    inverted: bool,
    context: &Context,
    target_content_type: ContentType,
    buffer: &mut String,
) -> MustacheResult<()> {
    let mut mbox = ExpressionInvocation::new(expression)
        .invoke(context)
        .map_err(|error| rewrap(error, tag))?;
    for hook in context.will_render_stack() {
        mbox = hook(tag, mbox);
    }

    // Did-render hooks only hear about tags whose expression evaluated.
    let did_render = context.did_render_stack();
    let rendering = match render_box(tag, &mbox, inverted, context) {
        Ok(rendering) => rendering,
        Err(error) => {
            for hook in &did_render {
                hook(tag, &mbox, None);
            }
            return Err(rewrap(error, tag));
        }
    };

    let string = if escapes_html
        && rendering.content_type == ContentType::Text
        && target_content_type == ContentType::Html
    {
        escape_html(&rendering.string)
    } else {
        rendering.string
    };
    for hook in &did_render {
        hook(tag, &mbox, Some(&string));
    }
    buffer.push_str(&string);
    Ok(())
}

fn render_box(tag: &Tag, mbox: &MustacheBox, inverted: bool, context: &Context) -> MustacheResult<Rendering> {
    match tag.tag_type() {
        TagType::Variable => mbox.render(&RenderingInfo::new(tag, context.clone(), false)),
        TagType::Section => match (mbox.bool_value(), inverted) {
            (true, false) => mbox.render(&RenderingInfo::new(tag, context.clone(), false)),
            (false, true) => tag.render(context),
            _ => Ok(Rendering::text("")),
        },
    }
}

/// Prefix framework errors with the failing tag. Locations set by deeper
/// tags are kept.
fn rewrap(error: Error, tag: &Tag) -> Error {
    match error {
        Error::Mustache(mut error) => {
            error.message = Some(match error.message.take() {
                Some(message) => format!("Could not evaluate {}: {}", tag, message),
                None => format!("Could not evaluate {}", tag),
            });
            Error::Mustache(error.with_location(tag.template_id(), tag.line_number()))
        }
        other => other,
    }
}

/// The AST that renders `block`: the innermost override found in the
/// partial-override stack. Each parent template is overridden at most once.
fn resolve_block(block: &Block, context: &Context) -> TemplateAst {
    let mut resolved = block.inner_ast.clone();
    let mut used_parents: Vec<&TemplateAst> = Vec::new();
    for partial_override in context.partial_override_stack() {
        let parent = &partial_override.parent.ast;
        if used_parents.iter().any(|used| used.ptr_eq(parent)) {
            continue;
        }
        if let Some(ast) = find_block(&block.name, &partial_override.child_ast, &mut Vec::new()) {
            resolved = ast;
            used_parents.push(parent);
        }
    }
    resolved
}

/// The last block named `name` in `ast`, searching nested partials and
/// partial overrides. `ancestors` holds the ASTs being searched, so that
/// recursive partials are not entered twice.
fn find_block(name: &str, ast: &TemplateAst, ancestors: &mut Vec<TemplateAst>) -> Option<TemplateAst> {
    if ancestors.iter().any(|ancestor| ancestor.ptr_eq(ast)) {
        return None;
    }
    ancestors.push(ast.clone());

    let mut found = None;
    for node in ast.nodes() {
        let candidate = match node {
            TemplateAstNode::Block(block) if block.name == name => Some(block.inner_ast.clone()),
            // The parent template of a nested override can override the
            // block too, and its own child overrides the parent.
            TemplateAstNode::PartialOverride(partial_override) => {
                let in_parent = find_block(name, &partial_override.parent.ast, ancestors);
                find_block(name, &partial_override.child_ast, ancestors).or(in_parent)
            }
            TemplateAstNode::Partial(partial) => find_block(name, &partial.ast, ancestors),
            _ => None,
        };
        if candidate.is_some() {
            found = candidate;
        }
    }
    ancestors.pop();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxable::boxed;
    use crate::error::ErrorKind;
    use crate::mustache_box::{DidRenderFn, RenderFn, WillRenderFn};
    use crate::repository::TemplateRepository;
    use crate::template::Template;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn render(template: &str, data: serde_json::Value) -> MustacheResult<String> {
        Template::from_string(template)?.render(data)
    }

    fn render_with(templates: &[(&str, &str)], name: &str, data: serde_json::Value) -> MustacheResult<String> {
        let repository = TemplateRepository::from_templates(templates.iter().copied());
        repository.template_named(name)?.render(data)
    }

    fn message(error: &Error) -> String {
        error.as_mustache().and_then(|e| e.message.clone()).unwrap_or_default()
    }

    // ========================================================================
    // Escaping
    // ========================================================================

    #[test]
    fn test_escaped_and_unescaped_variables() {
        let data = json!({ "x": "&<>\"'" });
        assert_eq!(render("{{x}}", data.clone()).unwrap(), "&amp;&lt;&gt;&quot;&apos;");
        assert_eq!(render("{{{x}}}", data.clone()).unwrap(), "&<>\"'");
        assert_eq!(render("{{&x}}", data.clone()).unwrap(), "&<>\"'");
        assert_eq!(render("{{%CONTENT_TYPE:TEXT}}{{x}}", data).unwrap(), "&<>\"'");
    }

    #[test]
    fn test_html_renderings_are_never_escaped() {
        let bold: RenderFn = Arc::new(|_| Ok(Rendering::html("<b>bold</b>")));
        let data = HashMap::from([("bold", boxed(&bold))]);
        let template = Template::from_string("{{bold}} {{{bold}}}").unwrap();
        assert_eq!(template.render(&data).unwrap(), "<b>bold</b> <b>bold</b>");
    }

    #[test]
    fn test_text_partial_is_escaped_in_html_template() {
        let templates = [("page", "{{>text}}|{{x}}"), ("text", "{{%CONTENT_TYPE:TEXT}}<{{x}}>")];
        assert_eq!(
            render_with(&templates, "page", json!({ "x": "&" })).unwrap(),
            "&lt;&amp;&gt;|&amp;"
        );
    }

    // ========================================================================
    // Sections
    // ========================================================================

    #[test]
    fn test_truthiness() {
        let template = "{{#x}}yes{{/x}}{{^x}}no{{/x}}";
        assert_eq!(render(template, json!({ "x": true })).unwrap(), "yes");
        assert_eq!(render(template, json!({ "x": false })).unwrap(), "no");
        assert_eq!(render(template, json!({ "x": 0 })).unwrap(), "no");
        assert_eq!(render(template, json!({ "x": "" })).unwrap(), "no");
        assert_eq!(render(template, json!({ "x": null })).unwrap(), "no");
        assert_eq!(render(template, json!({})).unwrap(), "no");
        assert_eq!(render(template, json!({ "x": {} })).unwrap(), "yes");
        assert_eq!(render(template, json!({ "x": [] })).unwrap(), "no");
    }

    #[test]
    fn test_collections_iterate() {
        assert_eq!(
            render("{{#items}}{{.}}{{/items}}", json!({ "items": ["a", "b"] })).unwrap(),
            "ab"
        );
        assert_eq!(
            render("{{#items}}<{{name}}>{{/items}}", json!({ "items": [{ "name": "a" }, { "name": "b" }] }))
                .unwrap(),
            "<a><b>"
        );
        assert_eq!(
            render("{{#items}}x{{/items}}{{^items}}empty{{/items}}", json!({ "items": [] })).unwrap(),
            "empty"
        );
    }

    #[test]
    fn test_sections_push_context() {
        let data = json!({ "name": "outer", "inner": { "name": "inner" }, "other": {} });
        assert_eq!(
            render("{{#inner}}{{name}}{{/inner}} {{#other}}{{name}}{{/other}}", data).unwrap(),
            "inner outer"
        );
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    #[test]
    fn test_will_render_replaces_boxes() {
        let shout: WillRenderFn = Arc::new(|_, mbox| match mbox.value_as::<String>() {
            Some(string) => boxed(&string.to_uppercase()),
            None => mbox,
        });
        let mut template = Template::from_string("{{name}} {{#shout}}{{name}}{{/shout}}").unwrap();
        template.extend_base_context(json!({ "name": "arthur" }));
        let data = HashMap::from([("shout", boxed(&shout))]);
        assert_eq!(template.render(&data).unwrap(), "arthur ARTHUR");
    }

    #[test]
    fn test_did_render_sees_emitted_strings() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let spy: DidRenderFn = Arc::new(move |tag, _, string| {
            record
                .lock()
                .unwrap()
                .push(format!("{} -> {:?}", tag.source(), string));
        });
        let failing: RenderFn = Arc::new(|_| Err(MustacheError::render("failed").into()));
        let mut template = Template::from_string("{{x}}{{failing}}").unwrap();
        template.extend_base_context(&spy);
        let data = HashMap::from([("x", boxed("<")), ("failing", boxed(&failing))]);
        assert!(template.render(&data).is_err());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "{{x}} -> Some(\"&lt;\")".to_string(),
                "{{failing}} -> None".to_string(),
            ]
        );
    }

    #[test]
    fn test_did_render_skips_tags_that_fail_to_evaluate() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let spy: DidRenderFn = Arc::new(move |tag, _, _| {
            record.lock().unwrap().push(tag.source().to_string());
        });
        let mut template = Template::from_string("{{x}}{{missing(x)}}").unwrap();
        template.extend_base_context(&spy);
        let error = template.render(json!({ "x": 1 })).unwrap_err();
        assert!(message(&error).ends_with("Missing filter"), "{}", error);
        assert_eq!(*seen.lock().unwrap(), vec!["{{x}}".to_string()]);
    }

    // ========================================================================
    // Errors
    // ========================================================================

    #[test]
    fn test_errors_are_rewrapped_with_location() {
        let templates = [("page", "a\n{{>p}}"), ("p", "\n\n{{f(x)}}")];
        let error = render_with(&templates, "page", json!({ "x": 1 })).unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::RenderError));
        assert_eq!(
            error.to_string(),
            "Rendering error at line 3 of template p: Could not evaluate {{f(x)}} at line 3 of template p: Missing filter"
        );
    }

    #[test]
    fn test_nested_tag_errors_keep_innermost_location() {
        let error = render("{{#a}}\n{{f(x)}}{{/a}}", json!({ "a": true, "f": "string" })).unwrap_err();
        let error = error.as_mustache().unwrap();
        assert_eq!(error.line_number, Some(2));
        assert_eq!(
            error.message.as_deref(),
            Some("Could not evaluate {{#a}} at line 1: Could not evaluate {{f(x)}} at line 2: Not a filter")
        );
    }

    #[test]
    fn test_custom_errors_pass_through() {
        #[derive(Debug)]
        struct Boom;
        impl std::fmt::Display for Boom {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("boom")
            }
        }
        impl std::error::Error for Boom {}

        let failing: RenderFn = Arc::new(|_| Err(Error::custom(Boom)));
        let data = HashMap::from([("failing", boxed(&failing))]);
        let error = Template::from_string("{{#a}}{{failing}}{{/a}}")
            .unwrap()
            .render(&data)
            .unwrap_err();
        let Error::Custom(inner) = error else {
            panic!("expected a custom error, got {:?}", error);
        };
        assert!(inner.downcast_ref::<Boom>().is_some());
    }

    // ========================================================================
    // Inheritance
    // ========================================================================

    #[test]
    fn test_block_defaults_and_overrides() {
        let templates = [
            ("layout", "<title>{{$title}}Default{{/title}}</title>{{$body}}{{/body}}"),
            ("page", "{{<layout}}{{$title}}{{name}}{{/title}}{{/layout}}"),
        ];
        assert_eq!(
            render_with(&templates, "layout", json!({})).unwrap(),
            "<title>Default</title>"
        );
        assert_eq!(
            render_with(&templates, "page", json!({ "name": "Page" })).unwrap(),
            "<title>Page</title>"
        );
    }

    #[test]
    fn test_multi_level_inheritance() {
        let templates = [
            ("base", "[{{$a}}base a{{/a}}|{{$b}}base b{{/b}}]"),
            ("middle", "{{<base}}{{$a}}middle a{{/a}}{{$b}}middle b{{/b}}{{/base}}"),
            ("leaf", "{{<middle}}{{$b}}leaf b{{/b}}{{/middle}}"),
        ];
        assert_eq!(
            render_with(&templates, "leaf", json!({})).unwrap(),
            "[middle a|leaf b]"
        );
    }

    #[test]
    fn test_blocks_found_through_partials_in_override() {
        let templates = [
            ("layout", "<{{$content}}none{{/content}}>"),
            ("blocks", "{{$content}}from partial{{/content}}"),
            ("page", "{{<layout}}{{>blocks}}{{/layout}}"),
        ];
        assert_eq!(render_with(&templates, "page", json!({})).unwrap(), "<from partial>");
    }

    #[test]
    fn test_nested_override_parent_overrides_block() {
        let templates = [
            ("page", "{{<partial}}{{<partial2}}{{/partial2}}{{/partial}}"),
            ("partial", "{{$block}}ignored{{/block}}"),
            ("partial2", "{{$block}}inherited{{/block}}"),
        ];
        assert_eq!(render_with(&templates, "page", json!({})).unwrap(), "inherited");
    }

    #[test]
    fn test_nested_override_child_wins_over_its_parent() {
        let templates = [
            ("page", "{{<partial}}{{<partial2}}{{$block}}inherited{{/block}}{{/partial2}}{{/partial}}"),
            ("partial", "{{$block}}ignored{{/block}}"),
            ("partial2", "{{$block}}ignored{{/block}}"),
        ];
        assert_eq!(render_with(&templates, "page", json!({})).unwrap(), "inherited");
    }

    #[test]
    fn test_repeated_partial_in_override_is_searched_each_time() {
        let templates = [
            ("layout", "<{{$content}}none{{/content}}>"),
            ("blocks", "{{$content}}from partial{{/content}}"),
            ("page", "{{<layout}}{{>blocks}}{{$content}}inline{{/content}}{{>blocks}}{{/layout}}"),
        ];
        assert_eq!(render_with(&templates, "page", json!({})).unwrap(), "<from partial>");
    }

    #[test]
    fn test_parent_is_overridden_once() {
        let templates = [
            ("parent", "{{$x}}default{{/x}}"),
            ("page", "{{<parent}}{{$x}}{{<parent}}{{$x}}inner{{/x}}{{/parent}}{{/x}}{{/parent}}"),
        ];
        assert_eq!(render_with(&templates, "page", json!({})).unwrap(), "inner");
    }

    #[test]
    fn test_recursive_partial_terminates() {
        let templates = [("loop", "{{#flag}}{{>loop}}{{/flag}}done")];
        assert_eq!(render_with(&templates, "loop", json!({ "flag": false })).unwrap(), "done");
    }
}
