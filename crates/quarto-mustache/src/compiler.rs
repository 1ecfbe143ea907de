/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Token stream to AST compilation.
//!
//! The compiler keeps a stack of open scopes (sections, blocks, partial
//! overrides). Closing tags pop a scope and append the corresponding node to
//! the enclosing one. Partials are resolved through the repository while
//! compiling.
//!
//! The content type of the template starts at the configured default and
//! can be changed by a `{{%CONTENT_TYPE:...}}` pragma until the first
//! variable, section, block or partial tag locks it.

use crate::ast::{Section, TemplateAst, TemplateAstNode, Variable};
use crate::error::{Error, MustacheError, MustacheResult};
use crate::expression::Expression;
use crate::expression_parser::ExpressionParser;
use crate::parser::{TemplateToken, TokenConsumer, TokenKind};
use crate::rendering::ContentType;
use crate::repository::TemplateRepository;
use crate::tag::Tag;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static TEXT_PRAGMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^CONTENT_TYPE\s*:\s*TEXT$").expect("valid regex"));
static HTML_PRAGMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^CONTENT_TYPE\s*:\s*HTML$").expect("valid regex"));

#[derive(Debug, Clone, Copy)]
enum CompilerContentType {
    Unlocked(ContentType),
    Locked(ContentType),
}

impl CompilerContentType {
    fn content_type(self) -> ContentType {
        match self {
            CompilerContentType::Unlocked(content_type) | CompilerContentType::Locked(content_type) => content_type,
        }
    }
}

enum ScopeKind {
    Root,
    Section {
        opening_token: TemplateToken,
        expression: Expression,
        inverted: bool,
    },
    PartialOverride {
        opening_token: TemplateToken,
        parent_partial_name: String,
    },
    Block {
        opening_token: TemplateToken,
        block_name: String,
    },
}

struct Scope {
    kind: ScopeKind,
    nodes: Vec<TemplateAstNode>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
        }
    }

    fn opening_token(&self) -> Option<&TemplateToken> {
        match &self.kind {
            ScopeKind::Root => None,
            ScopeKind::Section { opening_token, .. }
            | ScopeKind::PartialOverride { opening_token, .. }
            | ScopeKind::Block { opening_token, .. } => Some(opening_token),
        }
    }
}

pub struct TemplateCompiler {
    repository: TemplateRepository,
    template_id: Option<String>,
    content_type: CompilerContentType,
    scopes: Vec<Scope>,
    error: Option<Error>,
}

impl TemplateCompiler {
    pub fn new(content_type: ContentType, repository: TemplateRepository, template_id: Option<&str>) -> Self {
        Self {
            repository,
            template_id: template_id.map(str::to_string),
            content_type: CompilerContentType::Unlocked(content_type),
            scopes: vec![Scope::new(ScopeKind::Root)],
            error: None,
        }
    }

    /// The compiled nodes and content type, or the first error met.
    pub fn finish(mut self) -> MustacheResult<(Vec<TemplateAstNode>, ContentType)> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let content_type = self.content_type.content_type();
        let Some(scope) = self.scopes.pop() else {
            return Ok((Vec::new(), content_type));
        };
        if let Some(token) = scope.opening_token() {
            return Err(parse_error("Unclosed Mustache tag", token).into());
        }
        Ok((scope.nodes, content_type))
    }

    fn current_content_type(&self) -> ContentType {
        self.content_type.content_type()
    }

    fn lock_content_type(&mut self) {
        self.content_type = CompilerContentType::Locked(self.current_content_type());
    }

    fn current_scope(&mut self) -> &mut Scope {
        // The root scope is never popped.
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn in_partial_override(&self) -> bool {
        matches!(
            self.scopes.last().map(|scope| &scope.kind),
            Some(ScopeKind::PartialOverride { .. })
        )
    }

    fn append(&mut self, node: TemplateAstNode) {
        self.current_scope().nodes.push(node);
    }

    fn compile_token(&mut self, token: TemplateToken) -> MustacheResult<()> {
        match &token.kind {
            TokenKind::SetDelimiters | TokenKind::Comment => {}

            TokenKind::Pragma(content) => {
                let pragma = content.trim();
                let requested = if TEXT_PRAGMA.is_match(pragma) {
                    Some(ContentType::Text)
                } else if HTML_PRAGMA.is_match(pragma) {
                    Some(ContentType::Html)
                } else {
                    None
                };
                if let Some(requested) = requested {
                    match self.content_type {
                        CompilerContentType::Unlocked(_) => {
                            self.content_type = CompilerContentType::Unlocked(requested);
                        }
                        CompilerContentType::Locked(_) => {
                            let name = match requested {
                                ContentType::Text => "TEXT",
                                ContentType::Html => "HTML",
                            };
                            let message = format!(
                                "CONTENT_TYPE:{} pragma tag must prepend any Mustache variable, section, or partial tag.",
                                name
                            );
                            return Err(parse_error(message, &token).into());
                        }
                    }
                }
            }

            TokenKind::Text(text) => {
                // Only blocks are meaningful inside a partial override.
                if !self.in_partial_override() {
                    let text = text.clone();
                    self.append(TemplateAstNode::Text(text));
                }
            }

            TokenKind::EscapedVariable {
                content,
                tag_delimiter_pair,
            }
            | TokenKind::UnescapedVariable {
                content,
                tag_delimiter_pair,
            } => {
                let escapes_html = matches!(token.kind, TokenKind::EscapedVariable { .. });
                if self.in_partial_override() {
                    let message = if escapes_html {
                        "Illegal tag inside a partial override tag.".to_string()
                    } else {
                        format!(
                            "Illegal tag inside a partial override tag: {}",
                            token.template_substring()
                        )
                    };
                    return Err(parse_error(message, &token).into());
                }
                let expression = parse_expression(content, &token)?;
                let tag = Tag::variable(
                    self.current_content_type(),
                    Arc::from(token.template_substring()),
                    token.template_id.clone(),
                    token.line_number,
                    tag_delimiter_pair.clone(),
                );
                self.append(TemplateAstNode::Variable(Variable {
                    tag,
                    expression,
                    escapes_html,
                }));
                self.lock_content_type();
            }

            TokenKind::Section { content, .. } | TokenKind::InvertedSection { content, .. } => {
                if self.in_partial_override() {
                    let message = format!(
                        "Illegal tag inside a partial override tag: {}",
                        token.template_substring()
                    );
                    return Err(parse_error(message, &token).into());
                }
                let expression = parse_expression(content, &token)?;
                let inverted = matches!(token.kind, TokenKind::InvertedSection { .. });
                self.scopes.push(Scope::new(ScopeKind::Section {
                    opening_token: token,
                    expression,
                    inverted,
                }));
                self.lock_content_type();
            }

            TokenKind::Block(content) => {
                let block_name = required_tag_name(content, &token, "Missing block name", "Invalid block name")?;
                self.scopes.push(Scope::new(ScopeKind::Block {
                    opening_token: token,
                    block_name,
                }));
                self.lock_content_type();
            }

            TokenKind::PartialOverride(content) => {
                let parent_partial_name =
                    required_tag_name(content, &token, "Missing template name", "Invalid template name")?;
                self.scopes.push(Scope::new(ScopeKind::PartialOverride {
                    opening_token: token,
                    parent_partial_name,
                }));
                self.lock_content_type();
            }

            TokenKind::Close(content) => {
                let content = content.clone();
                self.close_scope(&content, &token)?;
            }

            TokenKind::Partial(content) => {
                let name = required_tag_name(content, &token, "Missing template name", "Invalid template name")?;
                let ast = self
                    .repository
                    .template_ast_named(&name, self.template_id.as_deref())?;
                self.append(TemplateAstNode::partial(ast, Some(name)));
                self.lock_content_type();
            }
        }
        Ok(())
    }

    fn close_scope(&mut self, content: &str, token: &TemplateToken) -> MustacheResult<()> {
        if self.scopes.len() <= 1 {
            return Err(parse_error("Unmatched closing tag", token).into());
        }
        let content_type = self.current_content_type();
        let Some(scope) = self.scopes.pop() else {
            return Err(parse_error("Unmatched closing tag", token).into());
        };
        let node = match scope.kind {
            ScopeKind::Root => {
                return Err(parse_error("Unmatched closing tag", token).into());
            }

            ScopeKind::Section {
                opening_token,
                expression,
                inverted,
            } => {
                // An empty closing tag `{{/}}` closes any section.
                let closing = ExpressionParser::new()
                    .parse_optional(content)
                    .map_err(|error| error.located(token.template_id.as_deref(), token.line_number))?;
                if closing.is_some_and(|closing| closing != expression) {
                    return Err(parse_error("Unmatched closing tag", token).into());
                }
                let inner_ast = TemplateAst::new(scope.nodes, content_type);
                let inner_range = opening_token.range.end..token.range.start;
                let tag = Tag::section(
                    inner_ast,
                    Arc::from(&token.template_string[inner_range]),
                    Arc::from(opening_token.template_substring()),
                    opening_token.template_id.clone(),
                    opening_token.line_number,
                    section_delimiters(&opening_token),
                );
                TemplateAstNode::Section(Section {
                    tag,
                    expression,
                    inverted,
                })
            }

            ScopeKind::PartialOverride {
                parent_partial_name,
                ..
            } => {
                if let Some(name) = tag_name(content, token, "Invalid template name")?
                    && name != parent_partial_name
                {
                    return Err(parse_error("Unmatched closing tag", token).into());
                }
                let parent_ast = self
                    .repository
                    .template_ast_named(&parent_partial_name, self.template_id.as_deref())?;
                if let Some(parent_content_type) = parent_ast.content_type()
                    && parent_content_type != content_type
                {
                    return Err(parse_error("Content type mismatch", token).into());
                }
                let child_ast = TemplateAst::new(scope.nodes, content_type);
                TemplateAstNode::partial_override(child_ast, parent_ast, Some(parent_partial_name))
            }

            ScopeKind::Block { block_name, .. } => {
                if let Some(name) = tag_name(content, token, "Invalid block name")?
                    && name != block_name
                {
                    return Err(parse_error("Unmatched closing tag", token).into());
                }
                let inner_ast = TemplateAst::new(scope.nodes, content_type);
                TemplateAstNode::block(inner_ast, block_name)
            }
        };
        self.append(node);
        Ok(())
    }
}

impl TokenConsumer for TemplateCompiler {
    fn consume(&mut self, token: TemplateToken) -> bool {
        if self.error.is_some() {
            return false;
        }
        match self.compile_token(token) {
            Ok(()) => true,
            Err(error) => {
                self.error = Some(error);
                false
            }
        }
    }

    fn fail(&mut self, error: MustacheError) {
        self.error = Some(error.into());
    }
}

fn parse_error(message: impl Into<String>, token: &TemplateToken) -> MustacheError {
    MustacheError::parse(message)
        .with_template_id(token.template_id.as_deref())
        .with_line_number(token.line_number)
}

fn parse_expression(content: &str, token: &TemplateToken) -> MustacheResult<Expression> {
    ExpressionParser::new()
        .parse(content)
        .map_err(|error| error.located(token.template_id.as_deref(), token.line_number))
}

fn section_delimiters(token: &TemplateToken) -> crate::tag::TagDelimiterPair {
    match &token.kind {
        TokenKind::Section {
            tag_delimiter_pair, ..
        }
        | TokenKind::InvertedSection {
            tag_delimiter_pair, ..
        } => tag_delimiter_pair.clone(),
        _ => ("{{".to_string(), "}}".to_string()),
    }
}

/// A trimmed partial or block name, `None` when empty.
fn tag_name(content: &str, token: &TemplateToken, invalid: &str) -> Result<Option<String>, MustacheError> {
    let name = content.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if name.chars().any(char::is_whitespace) {
        return Err(parse_error(invalid, token));
    }
    Ok(Some(name.to_string()))
}

fn required_tag_name(content: &str, token: &TemplateToken, missing: &str, invalid: &str) -> MustacheResult<String> {
    match tag_name(content, token, invalid)? {
        Some(name) => Ok(name),
        None => Err(parse_error(missing, token).into()),
    }
}
