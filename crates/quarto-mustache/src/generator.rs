/*
 * generator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template source regeneration, for debug descriptions.
//!
//! Set-delimiter tags are not part of the AST: the generated source always
//! uses the configured delimiters.

use crate::ast::{TemplateAst, TemplateAstNode};
use crate::configuration::Configuration;
use crate::tag::TagDelimiterPair;

pub struct TemplateGenerator {
    tag_delimiter_pair: TagDelimiterPair,
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new(&Configuration::default())
    }
}

impl TemplateGenerator {
    pub fn new(configuration: &Configuration) -> Self {
        Self {
            tag_delimiter_pair: configuration.tag_delimiter_pair.clone(),
        }
    }

    pub fn string_from(&self, ast: &TemplateAst) -> String {
        let mut buffer = String::new();
        self.generate(ast, &mut buffer);
        buffer
    }

    fn generate(&self, ast: &TemplateAst, buffer: &mut String) {
        for node in ast.nodes() {
            self.generate_node(node, buffer);
        }
    }

    fn tag(&self, content: &str, buffer: &mut String) {
        let (open, close) = &self.tag_delimiter_pair;
        buffer.push_str(open);
        buffer.push_str(content);
        buffer.push_str(close);
    }

    fn generate_node(&self, node: &TemplateAstNode, buffer: &mut String) {
        match node {
            TemplateAstNode::Text(text) => buffer.push_str(text),

            TemplateAstNode::Block(block) => {
                self.tag(&format!("${}", block.name), buffer);
                self.generate(&block.inner_ast, buffer);
                self.tag(&format!("/{}", block.name), buffer);
            }

            TemplateAstNode::PartialOverride(partial_override) => {
                let name = partial_override.parent.name.as_deref().unwrap_or("<null>");
                self.tag(&format!("<{}", name), buffer);
                self.generate(&partial_override.child_ast, buffer);
                self.tag(&format!("/{}", name), buffer);
            }

            // Partials are not expanded, which keeps recursive partials finite.
            TemplateAstNode::Partial(partial) => {
                let name = partial.name.as_deref().unwrap_or("<null>");
                self.tag(&format!(">{}", name), buffer);
            }

            TemplateAstNode::Section(section) => {
                let expression = section.expression.to_string();
                let sigil = if section.inverted { '^' } else { '#' };
                self.tag(&format!("{}{}", sigil, expression), buffer);
                if let Some(inner_ast) = section.tag.inner_template_ast() {
                    self.generate(inner_ast, buffer);
                }
                self.tag(&format!("/{}", expression), buffer);
            }

            TemplateAstNode::Variable(variable) => {
                let expression = variable.expression.to_string();
                let (open, close) = &self.tag_delimiter_pair;
                if variable.escapes_html {
                    self.tag(&expression, buffer);
                } else if open == "{{" && close == "}}" {
                    self.tag(&format!("{{{}}}", expression), buffer);
                } else {
                    self.tag(&format!("&{}", expression), buffer);
                }
            }
        }
    }
}
