/*
 * filter.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Constructors for filters and lambdas.
//!
//! A filter is a box with a [`FilterFn`]; templates apply it with
//! `{{ f(x) }}`. The helpers below cover the common shapes:
//!
//! - [`filter`], [`int_filter`], [`double_filter`] and [`string_filter`]
//!   take a single argument
//! - [`variadic_filter`] takes any number of arguments, `{{ f(a,b,c) }}`
//! - [`rendering_filter`] post-processes the rendering of its argument
//! - [`render_filter`] renders its argument with a custom render function
//!
//! Lambdas implement the Mustache lambda behavior as render functions.

use crate::error::{MustacheError, MustacheResult};
use crate::mustache_box::{FilterFn, MustacheBox, RenderFn, RenderingInfo};
use crate::rendering::{ContentType, Rendering};
use crate::repository::TemplateRepository;
use crate::tag::TagType;
use std::sync::Arc;

fn too_many_arguments() -> crate::Error {
    MustacheError::render("Too many arguments").into()
}

/// A single-argument filter.
pub fn filter<F>(f: F) -> FilterFn
where
    F: Fn(&MustacheBox) -> MustacheResult<MustacheBox> + Send + Sync + 'static,
{
    Arc::new(move |argument: &MustacheBox, partial_application: bool| {
        if partial_application {
            return Err(too_many_arguments());
        }
        f(argument)
    })
}

/// A filter whose argument is an integer, or `None` for any other value.
pub fn int_filter<F>(f: F) -> FilterFn
where
    F: Fn(Option<i64>) -> MustacheResult<MustacheBox> + Send + Sync + 'static,
{
    filter(move |argument| f(argument.value_as::<i64>().copied()))
}

/// A filter whose argument is a number, or `None` for any other value.
/// Integers are converted.
pub fn double_filter<F>(f: F) -> FilterFn
where
    F: Fn(Option<f64>) -> MustacheResult<MustacheBox> + Send + Sync + 'static,
{
    filter(move |argument| {
        let value = argument
            .value_as::<f64>()
            .copied()
            .or_else(|| argument.value_as::<i64>().map(|i| *i as f64));
        f(value)
    })
}

/// A filter whose argument is a string, or `None` for any other value.
pub fn string_filter<F>(f: F) -> FilterFn
where
    F: Fn(Option<&str>) -> MustacheResult<MustacheBox> + Send + Sync + 'static,
{
    filter(move |argument| f(argument.value_as::<String>().map(String::as_str)))
}

/// A filter taking all the arguments of `{{ f(a,b,c) }}` at once.
///
/// `f(a,b,c)` is evaluated as `f(a)(b)(c)`: each partial application returns
/// a new filter that remembers the arguments seen so far.
pub fn variadic_filter<F>(f: F) -> FilterFn
where
    F: Fn(&[MustacheBox]) -> MustacheResult<MustacheBox> + Send + Sync + 'static,
{
    partial_filter(Arc::new(f), Vec::new())
}

type VariadicFn = Arc<dyn Fn(&[MustacheBox]) -> MustacheResult<MustacheBox> + Send + Sync>;

fn partial_filter(f: VariadicFn, arguments: Vec<MustacheBox>) -> FilterFn {
    Arc::new(move |argument: &MustacheBox, partial_application: bool| {
        let mut arguments = arguments.clone();
        arguments.push(argument.clone());
        if partial_application {
            Ok(MustacheBox::from_filter(partial_filter(f.clone(), arguments)))
        } else {
            f(&arguments)
        }
    })
}

/// A filter that transforms the rendering of its argument.
///
/// ```ignore
/// let uppercase = rendering_filter(|rendering| {
///     Ok(Rendering::new(rendering.string.to_uppercase(), rendering.content_type))
/// });
/// ```
pub fn rendering_filter<F>(f: F) -> FilterFn
where
    F: Fn(Rendering) -> MustacheResult<Rendering> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    filter(move |argument| {
        let argument = argument.clone();
        let f = f.clone();
        Ok(MustacheBox::from_render(Arc::new(move |info: &RenderingInfo<'_>| {
            f(argument.render(info)?)
        })))
    })
}

/// A filter whose result renders with a custom function of its argument.
pub fn render_filter<F>(f: F) -> FilterFn
where
    F: Fn(&MustacheBox, &RenderingInfo<'_>) -> MustacheResult<Rendering> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    filter(move |argument| {
        let argument = argument.clone();
        let f = f.clone();
        Ok(MustacheBox::from_render(Arc::new(move |info: &RenderingInfo<'_>| {
            f(&argument, info)
        })))
    })
}

/// A Mustache lambda used as a section: `{{#lambda}}...{{/lambda}}`.
///
/// The lambda transforms the literal inner content of the section, and the
/// result is rendered as a template with the delimiters of the section.
/// Used as a variable, it renders `(Lambda)`.
pub fn lambda<F>(f: F) -> RenderFn
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    Arc::new(move |info: &RenderingInfo<'_>| match info.tag.tag_type() {
        TagType::Variable => Ok(Rendering::text("(Lambda)")),
        TagType::Section => {
            let repository = TemplateRepository::new();
            let mut configuration = repository.configuration();
            configuration.tag_delimiter_pair = info.tag.tag_delimiter_pair().clone();
            repository.set_configuration(configuration);
            let template = repository.template_from_string(&f(info.tag.inner_template_string()))?;
            template.render_context(&info.context)
        }
    })
}

/// A Mustache lambda used as a variable: `{{lambda}}`.
///
/// The returned string is rendered as a Text template, so that its output
/// is escaped in HTML templates. Used as a section, the lambda enters the
/// context stack and the section renders once.
pub fn lambda_variable<F>(f: F) -> RenderFn
where
    F: Fn() -> String + Send + Sync + 'static,
{
    let f: Arc<dyn Fn() -> String + Send + Sync> = Arc::new(f);
    variable_lambda_render(f)
}

fn variable_lambda_render(f: Arc<dyn Fn() -> String + Send + Sync>) -> RenderFn {
    Arc::new(move |info: &RenderingInfo<'_>| match info.tag.tag_type() {
        TagType::Variable => {
            let repository = TemplateRepository::new();
            let mut configuration = repository.configuration();
            configuration.content_type = ContentType::Text;
            repository.set_configuration(configuration);
            let template = repository.template_from_string(&f())?;
            template.render_context(&info.context)
        }
        TagType::Section => {
            let itself = MustacheBox::from_render(variable_lambda_render(f.clone()));
            info.tag.render(&info.context.extended_context(itself))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxable::boxed;
    use crate::{ErrorKind, Template};
    use std::collections::HashMap;

    fn render(template: &str, data: &HashMap<&str, MustacheBox>) -> crate::MustacheResult<String> {
        Template::from_string(template)?.render(data)
    }

    #[test]
    fn test_single_argument_filter_rejects_extra_arguments() {
        let f = filter(|mbox| Ok(mbox.clone()));
        let data = HashMap::from([("f", boxed(&f)), ("x", boxed("x"))]);
        assert_eq!(render("{{f(x)}}", &data).unwrap(), "x");
        let error = render("{{f(x,x)}}", &data).unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::RenderError));
        assert!(error.to_string().contains("Too many arguments"));
    }

    #[test]
    fn test_typed_filters() {
        let square = int_filter(|i| Ok(boxed(&i.map(|i| i * i))));
        let half = double_filter(|d| Ok(boxed(&d.map(|d| d / 2.0))));
        let shout = string_filter(|s| Ok(boxed(&s.map(str::to_uppercase))));
        let data = HashMap::from([
            ("square", boxed(&square)),
            ("half", boxed(&half)),
            ("shout", boxed(&shout)),
            ("n", boxed(&3)),
            ("s", boxed("hey")),
        ]);
        assert_eq!(
            render("{{square(n)}} {{half(n)}} {{shout(s)}} [{{square(s)}}]", &data).unwrap(),
            "9 1.5 HEY []"
        );
    }

    #[test]
    fn test_variadic_filter() {
        let join = variadic_filter(|args| {
            let parts: Vec<String> = args
                .iter()
                .map(|mbox| mbox.value().map(|v| v.to_string()).unwrap_or_default())
                .collect();
            Ok(boxed(&parts.join("-")))
        });
        let data = HashMap::from([
            ("join", boxed(&join)),
            ("a", boxed("a")),
            ("b", boxed(&2)),
        ]);
        assert_eq!(render("{{join(a)}}", &data).unwrap(), "a");
        assert_eq!(render("{{join(a,b,a)}}", &data).unwrap(), "a-2-a");
    }

    #[test]
    fn test_rendering_filter_sees_rendered_content() {
        let uppercase = rendering_filter(|rendering| {
            Ok(Rendering::new(rendering.string.to_uppercase(), rendering.content_type))
        });
        let data = HashMap::from([("uppercase", boxed(&uppercase)), ("name", boxed("Bob"))]);
        assert_eq!(
            render("{{uppercase(name)}} {{#uppercase(.)}}hello {{name}}{{/uppercase(.)}}", &data).unwrap(),
            "BOB HELLO BOB"
        );
    }

    #[test]
    fn test_render_filter() {
        let bracket = render_filter(|mbox, info| {
            let inner = mbox.render(info)?;
            Ok(Rendering::html(format!("<{}>", inner.string)))
        });
        let data = HashMap::from([("bracket", boxed(&bracket)), ("x", boxed("&"))]);
        assert_eq!(render("{{bracket(x)}}", &data).unwrap(), "<&>");
    }

    #[test]
    fn test_lambda_section() {
        let wrapped = lambda(|text| format!("<b>{}</b>", text));
        let data = HashMap::from([("wrapped", boxed(&wrapped)), ("name", boxed("Willy"))]);
        assert_eq!(
            render("{{#wrapped}}{{name}} is awesome.{{/wrapped}}", &data).unwrap(),
            "<b>Willy is awesome.</b>"
        );
        assert_eq!(render("{{wrapped}}", &data).unwrap(), "(Lambda)");
    }

    #[test]
    fn test_lambda_section_uses_current_delimiters() {
        let planet = lambda(|text| format!("{}{{{{planet}}}}", text));
        let data = HashMap::from([("lambda", boxed(&planet)), ("planet", boxed("Earth"))]);
        assert_eq!(
            render("{{=| |=}}<|#lambda|-|/lambda|>", &data).unwrap(),
            "<-{{planet}}>"
        );
    }

    #[test]
    fn test_lambda_variable_is_escaped() {
        let greater = lambda_variable(|| ">".to_string());
        let greeting = lambda_variable(|| "Hello, {{name}}".to_string());
        let data = HashMap::from([
            ("greater", boxed(&greater)),
            ("greeting", boxed(&greeting)),
            ("name", boxed("<World>")),
        ]);
        assert_eq!(render("{{greater}} {{{greater}}}", &data).unwrap(), "&gt; >");
        assert_eq!(
            render("{{{greeting}}}", &data).unwrap(),
            "Hello, <World>"
        );
        assert_eq!(render("{{#greater}}ok{{/greater}}", &data).unwrap(), "ok");
    }
}
