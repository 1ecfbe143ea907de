/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The template lexer.
//!
//! [`TemplateParser`] scans a template string and feeds a stream of
//! [`TemplateToken`]s to a [`TokenConsumer`]. It knows about delimiters and
//! tag sigils, and nothing about nesting: the compiler builds the tree.

use crate::error::MustacheError;
use crate::tag::TagDelimiterPair;
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `{{=<% %>=}}`
    SetDelimiters,
    /// `{{! comment }}`
    Comment,
    Text(String),
    /// `{{name}}`
    EscapedVariable {
        content: String,
        tag_delimiter_pair: TagDelimiterPair,
    },
    /// `{{{name}}}` and `{{&name}}`
    UnescapedVariable {
        content: String,
        tag_delimiter_pair: TagDelimiterPair,
    },
    /// `{{#name}}`
    Section {
        content: String,
        tag_delimiter_pair: TagDelimiterPair,
    },
    /// `{{^name}}`
    InvertedSection {
        content: String,
        tag_delimiter_pair: TagDelimiterPair,
    },
    /// `{{/name}}`
    Close(String),
    /// `{{>name}}`
    Partial(String),
    /// `{{<name}}`
    PartialOverride(String),
    /// `{{$name}}`
    Block(String),
    /// `{{%PRAGMA}}`
    Pragma(String),
}

#[derive(Debug, Clone)]
pub struct TemplateToken {
    pub kind: TokenKind,
    pub line_number: usize,
    pub template_id: Option<String>,
    pub template_string: Arc<str>,
    /// Byte range of the token in the template string.
    pub range: Range<usize>,
}

impl TemplateToken {
    /// The token as written in the template.
    pub fn template_substring(&self) -> &str {
        &self.template_string[self.range.clone()]
    }
}

/// Receives the tokens of a template.
pub trait TokenConsumer {
    /// Returns false to stop parsing.
    fn consume(&mut self, token: TemplateToken) -> bool;

    fn fail(&mut self, error: MustacheError);
}

struct Delimiters {
    pair: TagDelimiterPair,
    unescaped: Option<(&'static str, &'static str)>,
    set_delimiters_start: String,
    set_delimiters_end: String,
}

impl Delimiters {
    fn new(pair: TagDelimiterPair) -> Self {
        let standard = pair.0 == "{{" && pair.1 == "}}";
        Self {
            unescaped: standard.then_some(("{{{", "}}}")),
            set_delimiters_start: format!("{}=", pair.0),
            set_delimiters_end: format!("={}", pair.1),
            pair,
        }
    }
}

#[derive(Clone, Copy)]
enum State {
    Start,
    Text { start: usize, line: usize },
    Tag { start: usize, line: usize },
    UnescapedTag { start: usize, line: usize },
    SetDelimitersTag { start: usize, line: usize },
}

pub struct TemplateParser {
    tag_delimiter_pair: TagDelimiterPair,
}

/// Which tag is opening at the current position, if any.
enum Opening {
    Unescaped,
    SetDelimiters,
    Tag,
}

impl TemplateParser {
    pub fn new(tag_delimiter_pair: TagDelimiterPair) -> Self {
        Self { tag_delimiter_pair }
    }

    pub fn parse(&self, template_string: &str, template_id: Option<&str>, consumer: &mut dyn TokenConsumer) {
        let source: Arc<str> = Arc::from(template_string);
        let mut scanner = Scanner {
            source: source.clone(),
            template_id: template_id.map(str::to_string),
            consumer,
        };
        let s: &str = &source;
        let mut delimiters = Delimiters::new(self.tag_delimiter_pair.clone());
        let mut state = State::Start;
        let mut line = 1;
        let mut i = 0;

        while i < s.len() {
            let rest = &s[i..];
            let Some(c) = rest.chars().next() else {
                break;
            };
            let mut next = i + c.len_utf8();

            match state {
                State::Start | State::Text { .. } => {
                    if c == '\n' {
                        if matches!(state, State::Start) {
                            state = State::Text { start: i, line };
                        }
                        line += 1;
                    } else if let Some((opening, length)) = opening_at(rest, &delimiters) {
                        if let State::Text { start, line: text_line } = state
                            && !scanner.emit(TokenKind::Text(s[start..i].to_string()), text_line, start..i)
                        {
                            return;
                        }
                        state = match opening {
                            Opening::Unescaped => State::UnescapedTag { start: i, line },
                            Opening::SetDelimiters => State::SetDelimitersTag { start: i, line },
                            Opening::Tag => State::Tag { start: i, line },
                        };
                        next = i + length;
                    } else if matches!(state, State::Start) {
                        state = State::Text { start: i, line };
                    }
                }

                State::Tag { start, line: tag_line } => {
                    if c == '\n' {
                        line += 1;
                    } else if rest.starts_with(delimiters.pair.1.as_str()) {
                        let initial = start + delimiters.pair.0.len();
                        let end = i + delimiters.pair.1.len();
                        let kind = tag_kind(&s[initial..i], &delimiters.pair);
                        if !scanner.emit(kind, tag_line, start..end) {
                            return;
                        }
                        state = State::Start;
                        next = end;
                    }
                }

                State::UnescapedTag { start, line: tag_line } => {
                    if c == '\n' {
                        line += 1;
                    } else if let Some((open, close)) = delimiters.unescaped
                        && rest.starts_with(close)
                    {
                        let end = i + close.len();
                        let kind = TokenKind::UnescapedVariable {
                            content: s[start + open.len()..i].to_string(),
                            tag_delimiter_pair: delimiters.pair.clone(),
                        };
                        if !scanner.emit(kind, tag_line, start..end) {
                            return;
                        }
                        state = State::Start;
                        next = end;
                    }
                }

                State::SetDelimitersTag { start, line: tag_line } => {
                    if c == '\n' {
                        line += 1;
                    } else if rest.starts_with(delimiters.set_delimiters_end.as_str()) {
                        let content = &s[start + delimiters.set_delimiters_start.len()..i];
                        let new_delimiters: Vec<&str> = content.split_whitespace().collect();
                        if new_delimiters.len() != 2 {
                            scanner.fail("Invalid set delimiters tag", tag_line);
                            return;
                        }
                        let end = i + delimiters.set_delimiters_end.len();
                        if !scanner.emit(TokenKind::SetDelimiters, tag_line, start..end) {
                            return;
                        }
                        delimiters = Delimiters::new((
                            new_delimiters[0].to_string(),
                            new_delimiters[1].to_string(),
                        ));
                        state = State::Start;
                        next = end;
                    }
                }
            }
            i = next;
        }

        match state {
            State::Start => {}
            State::Text { start, line } => {
                scanner.emit(TokenKind::Text(s[start..].to_string()), line, start..s.len());
            }
            State::Tag { line, .. }
            | State::UnescapedTag { line, .. }
            | State::SetDelimitersTag { line, .. } => {
                scanner.fail("Unclosed Mustache tag", line);
            }
        }
    }
}

/// Longest openings first: `{{{` and `{{=` both start with `{{`.
fn opening_at(rest: &str, delimiters: &Delimiters) -> Option<(Opening, usize)> {
    if let Some((open, _)) = delimiters.unescaped
        && rest.starts_with(open)
    {
        return Some((Opening::Unescaped, open.len()));
    }
    if rest.starts_with(delimiters.set_delimiters_start.as_str()) {
        return Some((Opening::SetDelimiters, delimiters.set_delimiters_start.len()));
    }
    if rest.starts_with(delimiters.pair.0.as_str()) {
        return Some((Opening::Tag, delimiters.pair.0.len()));
    }
    None
}

/// The token for the inside of a regular tag, selected by its sigil.
fn tag_kind(inside: &str, pair: &TagDelimiterPair) -> TokenKind {
    let mut chars = inside.chars();
    let sigil = chars.next();
    let content = chars.as_str().to_string();
    match sigil {
        Some('!') => TokenKind::Comment,
        Some('#') => TokenKind::Section {
            content,
            tag_delimiter_pair: pair.clone(),
        },
        Some('^') => TokenKind::InvertedSection {
            content,
            tag_delimiter_pair: pair.clone(),
        },
        Some('$') => TokenKind::Block(content),
        Some('/') => TokenKind::Close(content),
        Some('>') => TokenKind::Partial(content),
        Some('<') => TokenKind::PartialOverride(content),
        Some('&') => TokenKind::UnescapedVariable {
            content,
            tag_delimiter_pair: pair.clone(),
        },
        Some('%') => TokenKind::Pragma(content),
        _ => TokenKind::EscapedVariable {
            content: inside.to_string(),
            tag_delimiter_pair: pair.clone(),
        },
    }
}

struct Scanner<'c> {
    source: Arc<str>,
    template_id: Option<String>,
    consumer: &'c mut dyn TokenConsumer,
}

impl Scanner<'_> {
    fn emit(&mut self, kind: TokenKind, line_number: usize, range: Range<usize>) -> bool {
        self.consumer.consume(TemplateToken {
            kind,
            line_number,
            template_id: self.template_id.clone(),
            template_string: self.source.clone(),
            range,
        })
    }

    fn fail(&mut self, message: &str, line_number: usize) {
        let error = MustacheError::parse(message)
            .with_template_id(self.template_id.as_deref())
            .with_line_number(line_number);
        self.consumer.fail(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collector {
        tokens: Vec<(TokenKind, usize, String)>,
        error: Option<MustacheError>,
    }

    impl TokenConsumer for Collector {
        fn consume(&mut self, token: TemplateToken) -> bool {
            let substring = token.template_substring().to_string();
            self.tokens.push((token.kind, token.line_number, substring));
            true
        }

        fn fail(&mut self, error: MustacheError) {
            self.error = Some(error);
        }
    }

    fn lex(template: &str) -> Collector {
        let mut collector = Collector::default();
        TemplateParser::new(("{{".to_string(), "}}".to_string())).parse(template, Some("t"), &mut collector);
        collector
    }

    fn standard() -> TagDelimiterPair {
        ("{{".to_string(), "}}".to_string())
    }

    #[test]
    fn test_text_and_variables() {
        let collector = lex("Hello {{name}}!");
        assert!(collector.error.is_none());
        assert_eq!(
            collector.tokens,
            vec![
                (TokenKind::Text("Hello ".to_string()), 1, "Hello ".to_string()),
                (
                    TokenKind::EscapedVariable {
                        content: "name".to_string(),
                        tag_delimiter_pair: standard(),
                    },
                    1,
                    "{{name}}".to_string()
                ),
                (TokenKind::Text("!".to_string()), 1, "!".to_string()),
            ]
        );
    }

    #[test]
    fn test_tag_sigils() {
        let collector = lex("{{!c}}{{#s}}{{^i}}{{/s}}{{>p}}{{<o}}{{$b}}{{&u}}{{%P}}{{{t}}}");
        let kinds: Vec<TokenKind> = collector.tokens.into_iter().map(|(kind, _, _)| kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Comment,
                TokenKind::Section {
                    content: "s".to_string(),
                    tag_delimiter_pair: standard()
                },
                TokenKind::InvertedSection {
                    content: "i".to_string(),
                    tag_delimiter_pair: standard()
                },
                TokenKind::Close("s".to_string()),
                TokenKind::Partial("p".to_string()),
                TokenKind::PartialOverride("o".to_string()),
                TokenKind::Block("b".to_string()),
                TokenKind::UnescapedVariable {
                    content: "u".to_string(),
                    tag_delimiter_pair: standard()
                },
                TokenKind::Pragma("P".to_string()),
                TokenKind::UnescapedVariable {
                    content: "t".to_string(),
                    tag_delimiter_pair: standard()
                },
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let collector = lex("a\nb\n{{x}}\n{{#y\n}}");
        let lines: Vec<usize> = collector.tokens.iter().map(|(_, line, _)| *line).collect();
        assert_eq!(lines, vec![1, 3, 3, 4]);
    }

    #[test]
    fn test_set_delimiters() {
        let collector = lex("{{=<% %>=}}<%name%>{{name}}<%={{ }}=%>{{{x}}}");
        let substrings: Vec<&str> = collector.tokens.iter().map(|(_, _, s)| s.as_str()).collect();
        assert_eq!(
            substrings,
            vec!["{{=<% %>=}}", "<%name%>", "{{name}}", "<%={{ }}=%>", "{{{x}}}"]
        );
        assert_eq!(
            collector.tokens[1].0,
            TokenKind::EscapedVariable {
                content: "name".to_string(),
                tag_delimiter_pair: ("<%".to_string(), "%>".to_string()),
            }
        );
        assert!(matches!(collector.tokens[2].0, TokenKind::Text(_)));
    }

    #[test]
    fn test_triple_mustache_needs_standard_delimiters() {
        let collector = lex("{{=[ ]=}}[{x}]");
        assert_eq!(
            collector.tokens[1].0,
            TokenKind::EscapedVariable {
                content: "{x}".to_string(),
                tag_delimiter_pair: ("[".to_string(), "]".to_string()),
            }
        );
    }

    #[test]
    fn test_invalid_set_delimiters() {
        let collector = lex("{{=a=}}");
        let error = collector.error.unwrap();
        assert_eq!(error.message.as_deref(), Some("Invalid set delimiters tag"));
    }

    #[test]
    fn test_unclosed_tag_reports_opening_line() {
        let collector = lex("text\n{{name\n\n");
        let error = collector.error.unwrap();
        assert_eq!(error.to_string(), "Parse error at line 2 of template t: Unclosed Mustache tag");
    }

    #[test]
    fn test_empty_tag() {
        let collector = lex("{{}}");
        assert_eq!(
            collector.tokens[0].0,
            TokenKind::EscapedVariable {
                content: String::new(),
                tag_delimiter_pair: standard(),
            }
        );
    }

    #[test]
    fn test_multibyte_text() {
        let collector = lex("é{{x}}ü");
        assert_eq!(collector.tokens.len(), 3);
        assert_eq!(collector.tokens[2].2, "ü");
    }
}
