/*
 * expression_parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Character-level state machine that turns tag content into an [`Expression`].
//!
//! In-progress filter calls live on a side stack, so that nested calls
//! `f(g(x))`, chained calls `f(a)(b)` and argument lists `f(a,b)` all reduce
//! to binary [`Expression::Filter`] nodes.

use crate::error::{MustacheError, MustacheResult};
use crate::expression::Expression;

#[derive(Debug)]
enum State {
    Error(String),
    WaitingForAnyExpression,
    LeadingDot,
    Identifier { start: usize },
    ScopingIdentifier { start: usize, base: Expression },
    WaitingForScopingIdentifier { base: Expression },
    DoneExpression { expression: Expression },
    DoneExpressionPlusWhiteSpace { expression: Expression },
}

/// Parser for tag expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionParser;

impl ExpressionParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse an expression, failing with `Missing expression` when `source`
    /// contains nothing but white space.
    pub fn parse(&self, source: &str) -> MustacheResult<Expression> {
        match self.parse_optional(source)? {
            Some(expression) => Ok(expression),
            None => Err(MustacheError::parse("Missing expression").into()),
        }
    }

    /// Parse an expression, returning `None` for an empty expression.
    ///
    /// Closing tags such as `{{/}}` are allowed to omit their expression, so
    /// callers need to tell "nothing" apart from "malformed".
    pub fn parse_optional(&self, source: &str) -> MustacheResult<Option<Expression>> {
        scan(source).map_err(|description| {
            MustacheError::parse(format!("Invalid expression `{}`: {}", source, description)).into()
        })
    }
}

fn is_white_space(c: char) -> bool {
    matches!(c, ' ' | '\r' | '\n' | '\t')
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '{' | '}' | '&' | '$' | '#' | '^' | '/' | '<' | '>')
}

fn unexpected(c: char, index: usize) -> State {
    State::Error(format!("Unexpected character `{}` at index {}", c, index))
}

/// Close the innermost pending call with `argument`.
fn close_call(stack: &mut Vec<Expression>, argument: Expression, c: char, index: usize) -> State {
    match stack.pop() {
        Some(filter) => State::DoneExpression {
            expression: Expression::filter(filter, argument, false),
        },
        None => unexpected(c, index),
    }
}

/// Record `argument` as a partial application and wait for the next one.
fn next_argument(stack: &mut Vec<Expression>, argument: Expression, c: char, index: usize) -> State {
    match stack.pop() {
        Some(filter) => {
            stack.push(Expression::filter(filter, argument, true));
            State::WaitingForAnyExpression
        }
        None => unexpected(c, index),
    }
}

/// Run the state machine. `Ok(None)` means the source is empty.
fn scan(source: &str) -> Result<Option<Expression>, String> {
    let mut state = State::WaitingForAnyExpression;
    let mut stack: Vec<Expression> = Vec::new();
    // Error messages report character offsets, slices need byte offsets.
    let mut char_count = 0;

    for (index, (offset, c)) in source.char_indices().enumerate() {
        if matches!(state, State::Error(_)) {
            break;
        }
        char_count = index + 1;
        state = match state {
            State::Error(message) => State::Error(message),

            State::WaitingForAnyExpression => match c {
                c if is_white_space(c) => State::WaitingForAnyExpression,
                '.' => State::LeadingDot,
                '(' | ')' | ',' => unexpected(c, index),
                c if is_forbidden(c) => unexpected(c, index),
                _ => State::Identifier { start: offset },
            },

            State::LeadingDot => match c {
                c if is_white_space(c) => State::DoneExpressionPlusWhiteSpace {
                    expression: Expression::ImplicitIterator,
                },
                '.' => unexpected(c, index),
                '(' => {
                    stack.push(Expression::ImplicitIterator);
                    State::WaitingForAnyExpression
                }
                ')' => close_call(&mut stack, Expression::ImplicitIterator, c, index),
                ',' => next_argument(&mut stack, Expression::ImplicitIterator, c, index),
                c if is_forbidden(c) => unexpected(c, index),
                _ => State::ScopingIdentifier {
                    start: offset,
                    base: Expression::ImplicitIterator,
                },
            },

            State::Identifier { start } => {
                let identifier = || Expression::identifier(&source[start..offset]);
                match c {
                    c if is_white_space(c) => State::DoneExpressionPlusWhiteSpace {
                        expression: identifier(),
                    },
                    '.' => State::WaitingForScopingIdentifier { base: identifier() },
                    '(' => {
                        stack.push(identifier());
                        State::WaitingForAnyExpression
                    }
                    ')' => close_call(&mut stack, identifier(), c, index),
                    ',' => next_argument(&mut stack, identifier(), c, index),
                    _ => State::Identifier { start },
                }
            }

            State::ScopingIdentifier { start, base } => {
                if is_white_space(c) || matches!(c, '.' | '(' | ')' | ',') {
                    let scoped = Expression::scoped(base, &source[start..offset]);
                    match c {
                        '.' => State::WaitingForScopingIdentifier { base: scoped },
                        '(' => {
                            stack.push(scoped);
                            State::WaitingForAnyExpression
                        }
                        ')' => close_call(&mut stack, scoped, c, index),
                        ',' => next_argument(&mut stack, scoped, c, index),
                        _ => State::DoneExpressionPlusWhiteSpace { expression: scoped },
                    }
                } else {
                    State::ScopingIdentifier { start, base }
                }
            }

            State::WaitingForScopingIdentifier { base } => match c {
                c if is_white_space(c) => State::Error(format!(
                    "Unexpected white space character at index {}",
                    index
                )),
                '.' | '(' | ')' | ',' => unexpected(c, index),
                c if is_forbidden(c) => unexpected(c, index),
                _ => State::ScopingIdentifier { start: offset, base },
            },

            State::DoneExpression { expression } => match c {
                c if is_white_space(c) => State::DoneExpressionPlusWhiteSpace { expression },
                '.' => State::WaitingForScopingIdentifier { base: expression },
                '(' => {
                    stack.push(expression);
                    State::WaitingForAnyExpression
                }
                ')' => close_call(&mut stack, expression, c, index),
                ',' => next_argument(&mut stack, expression, c, index),
                _ => unexpected(c, index),
            },

            State::DoneExpressionPlusWhiteSpace { expression } => match c {
                c if is_white_space(c) => State::DoneExpressionPlusWhiteSpace { expression },
                '(' => {
                    stack.push(expression);
                    State::WaitingForAnyExpression
                }
                ')' => close_call(&mut stack, expression, c, index),
                ',' => next_argument(&mut stack, expression, c, index),
                _ => unexpected(c, index),
            },
        };
    }

    let missing_paren = || format!("Missing `)` character at index {}", char_count);
    let finish = |expression: Expression| {
        if stack.is_empty() {
            Ok(Some(expression))
        } else {
            Err(missing_paren())
        }
    };

    match state {
        State::Error(message) => Err(message),
        State::WaitingForAnyExpression => {
            if stack.is_empty() {
                Ok(None)
            } else {
                Err(missing_paren())
            }
        }
        State::LeadingDot => finish(Expression::ImplicitIterator),
        State::Identifier { start } => finish(Expression::identifier(&source[start..])),
        State::ScopingIdentifier { start, base } => {
            finish(Expression::scoped(base, &source[start..]))
        }
        State::WaitingForScopingIdentifier { .. } => {
            Err(format!("Missing identifier at index {}", char_count))
        }
        State::DoneExpression { expression } | State::DoneExpressionPlusWhiteSpace { expression } => {
            finish(expression)
        }
    }
}
