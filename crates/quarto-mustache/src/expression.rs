/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expressions found inside Mustache tags.
//!
//! An expression is a dotted and/or filtered lookup path:
//!
//! - `.` (the implicit iterator)
//! - `name`
//! - `a.b.c`
//! - `f(a)`, `f(a)(b)`, and `f(a,b)`, the curried form of `f(a)(b)`
//!
//! Equality is structural. The compiler relies on it to check that a closing
//! tag matches its opening tag.

use crate::error::MustacheResult;
use crate::expression_parser::ExpressionParser;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// `.`
    ImplicitIterator,

    /// `name`
    Identifier(String),

    /// `base.identifier`
    Scoped {
        base: Box<Expression>,
        identifier: String,
    },

    /// `filter(argument)`.
    ///
    /// `f(a,b)` parses as `Filter { filter: Filter { f, a, partial }, b }`,
    /// where the inner application has `partial_application` set.
    Filter {
        filter: Box<Expression>,
        argument: Box<Expression>,
        partial_application: bool,
    },
}

impl Expression {
    /// Parse an expression string.
    pub fn parse(source: &str) -> MustacheResult<Expression> {
        ExpressionParser::new().parse(source)
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier(name.into())
    }

    pub fn scoped(base: Expression, identifier: impl Into<String>) -> Self {
        Expression::Scoped {
            base: Box::new(base),
            identifier: identifier.into(),
        }
    }

    pub fn filter(filter: Expression, argument: Expression, partial_application: bool) -> Self {
        Expression::Filter {
            filter: Box::new(filter),
            argument: Box::new(argument),
            partial_application,
        }
    }
}

/// Writes the canonical source form of an expression.
///
/// The output parses back to a structurally equal expression.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::ImplicitIterator => f.write_str("."),
            Expression::Identifier(name) => f.write_str(name),
            Expression::Scoped { base, identifier } => {
                if **base != Expression::ImplicitIterator {
                    write!(f, "{}", base)?;
                }
                write!(f, ".{}", identifier)
            }
            Expression::Filter {
                filter,
                argument,
                partial_application,
            } => {
                match filter.as_ref() {
                    // The callee already opened the argument list.
                    Expression::Filter {
                        partial_application: true,
                        ..
                    } => write!(f, "{}", filter)?,
                    _ => write!(f, "{}(", filter)?,
                }
                write!(f, "{}", argument)?;
                f.write_str(if *partial_application { "," } else { ")" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(source: &str) {
        let expression = Expression::parse(source).unwrap();
        let generated = expression.to_string();
        let reparsed = Expression::parse(&generated).unwrap();
        assert_eq!(reparsed, expression, "{} regenerated as {}", source, generated);
    }

    #[test]
    fn test_display_simple() {
        assert_eq!(Expression::ImplicitIterator.to_string(), ".");
        assert_eq!(Expression::identifier("name").to_string(), "name");
        let scoped = Expression::scoped(
            Expression::scoped(Expression::identifier("a"), "b"),
            "c",
        );
        assert_eq!(scoped.to_string(), "a.b.c");
    }

    #[test]
    fn test_display_implicit_iterator_scope() {
        let scoped = Expression::scoped(Expression::ImplicitIterator, "name");
        assert_eq!(scoped.to_string(), ".name");
    }

    #[test]
    fn test_display_partial_application() {
        let expression = Expression::parse("f(a,b)").unwrap();
        assert_eq!(expression.to_string(), "f(a,b)");
        let expression = Expression::parse("f(a)(b)").unwrap();
        assert_eq!(expression.to_string(), "f(a)(b)");
    }

    #[test]
    fn test_round_trips() {
        for source in [
            ".",
            "a",
            "a.b.c",
            ".a.b",
            "f(a)",
            "f(a,b)",
            "f(a, b, c)",
            "f(a)(b)",
            "f(g(x)).y",
            "f(.)",
            "a.f(b.c, d).e",
        ] {
            round_trip(source);
        }
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(
            Expression::parse("a.b").unwrap(),
            Expression::parse(" a.b ").unwrap()
        );
        assert_ne!(
            Expression::parse("f(a,b)").unwrap(),
            Expression::parse("f(a)(b)").unwrap()
        );
    }
}
