/*
 * invocation.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Evaluation of expressions against a context.

use crate::context::Context;
use crate::error::{MustacheError, MustacheResult};
use crate::expression::Expression;
use crate::mustache_box::MustacheBox;

pub struct ExpressionInvocation<'a> {
    expression: &'a Expression,
}

impl<'a> ExpressionInvocation<'a> {
    pub fn new(expression: &'a Expression) -> Self {
        Self { expression }
    }

    pub fn invoke(&self, context: &Context) -> MustacheResult<MustacheBox> {
        evaluate(self.expression, context)
    }
}

fn evaluate(expression: &Expression, context: &Context) -> MustacheResult<MustacheBox> {
    match expression {
        Expression::ImplicitIterator => Ok(context.top_box()),

        Expression::Identifier(name) => {
            let mbox = context.mustache_box_for_key(name);
            check_missing(mbox, context)
        }

        Expression::Scoped { base, identifier } => {
            let base = evaluate(base, context)?;
            check_missing(base.mustache_box_for_key(identifier), context)
        }

        Expression::Filter {
            filter,
            argument,
            partial_application,
        } => {
            let filter_box = evaluate(filter, context)?;
            let Some(filter_fn) = filter_box.filter() else {
                let message = if filter_box.is_empty() {
                    "Missing filter"
                } else {
                    "Not a filter"
                };
                return Err(MustacheError::render(message).into());
            };
            let argument = evaluate(argument, context)?;
            filter_fn(&argument, *partial_application)
        }
    }
}

fn check_missing(mbox: MustacheBox, context: &Context) -> MustacheResult<MustacheBox> {
    if mbox.is_empty() && context.throw_when_missing() {
        return Err(MustacheError::render("Missing identifier").into());
    }
    Ok(mbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxable::boxed;
    use crate::error::ErrorKind;
    use crate::filter::filter;
    use serde_json::json;
    use std::collections::HashMap;

    fn invoke(source: &str, context: &Context) -> MustacheResult<MustacheBox> {
        let expression = Expression::parse(source).unwrap();
        ExpressionInvocation::new(&expression).invoke(context)
    }

    fn message(error: crate::Error) -> String {
        error.as_mustache().and_then(|e| e.message.clone()).unwrap_or_default()
    }

    #[test]
    fn test_identifier_and_scope() {
        let context = Context::with_box(json!({ "a": { "b": { "c": "deep" } } }));
        let mbox = invoke("a.b.c", &context).unwrap();
        assert_eq!(mbox.value_as::<String>().map(String::as_str), Some("deep"));
        assert!(invoke("a.x.c", &context).unwrap().is_empty());
    }

    #[test]
    fn test_implicit_iterator() {
        let context = Context::with_box("top");
        let mbox = invoke(".", &context).unwrap();
        assert_eq!(mbox.value_as::<String>().map(String::as_str), Some("top"));
    }

    #[test]
    fn test_scoped_lookup_does_not_climb_the_stack() {
        let context = Context::with_box(json!({ "name": "outer" }))
            .extended_context(json!({ "a": {} }));
        assert!(invoke("a.name", &context).unwrap().is_empty());
    }

    #[test]
    fn test_filter_application() {
        let double = filter(|mbox: &MustacheBox| {
            let value = mbox.value_as::<i64>().copied().unwrap_or_default();
            Ok(boxed(&(value * 2)))
        });
        let mut data = HashMap::new();
        data.insert("double".to_string(), boxed(&double));
        data.insert("x".to_string(), boxed(&21));
        let context = Context::with_box(&data);
        let result = invoke("double(x)", &context).unwrap();
        assert_eq!(result.value_as::<i64>(), Some(&42));
        let result = invoke("double(double(x))", &context).unwrap();
        assert_eq!(result.value_as::<i64>(), Some(&84));
    }

    #[test]
    fn test_missing_filter_and_not_a_filter() {
        let context = Context::with_box(json!({ "f": "string", "x": 1 }));
        let error = invoke("missing(x)", &context).unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::RenderError));
        assert_eq!(message(error), "Missing filter");

        let error = invoke("f(x)", &context).unwrap_err();
        assert_eq!(message(error), "Not a filter");
    }

    #[test]
    fn test_throw_when_missing() {
        let context = Context::with_box(json!({ "a": {} })).with_throw_when_missing(true);
        assert_eq!(message(invoke("b", &context).unwrap_err()), "Missing identifier");
        assert_eq!(message(invoke("a.b", &context).unwrap_err()), "Missing identifier");
        assert!(invoke("a", &context).is_ok());
        // The implicit iterator is never missing.
        assert!(invoke(".", &Context::new().with_throw_when_missing(true)).is_ok());
    }
}
