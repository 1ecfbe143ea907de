/*
 * mustache_box.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The universal boxed value fed to templates.
//!
//! A [`MustacheBox`] is a closed type whose capabilities are the optional
//! facets it was built with: a value, a keyed subscript, a filter, a custom
//! render function, and will/did-render hooks. A box built with none of them
//! is *the* empty box, whatever its truthiness.
//!
//! Boxes are immutable and cheap to clone.

use crate::boxable::{ArrayValue, DictionaryValue};
use crate::context::Context;
use crate::error::MustacheResult;
use crate::rendering::Rendering;
use crate::tag::{Tag, TagType};
use once_cell::sync::Lazy;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Resolves a key against a value, e.g. a dictionary lookup.
pub type KeyedSubscriptFn = Arc<dyn Fn(&str) -> MustacheBox + Send + Sync>;

/// Called with the argument box and a flag telling whether more arguments
/// follow (`f(a,b)` calls the filter of `f` with `a` and `true`).
pub type FilterFn = Arc<dyn Fn(&MustacheBox, bool) -> MustacheResult<MustacheBox> + Send + Sync>;

/// Renders a box for a tag.
pub type RenderFn = Arc<dyn Fn(&RenderingInfo<'_>) -> MustacheResult<Rendering> + Send + Sync>;

/// Called before a tag renders, may substitute the box about to render.
pub type WillRenderFn = Arc<dyn Fn(&Tag, MustacheBox) -> MustacheBox + Send + Sync>;

/// Called after a tag rendered, with `None` if rendering failed.
pub type DidRenderFn = Arc<dyn Fn(&Tag, &MustacheBox, Option<&str>) + Send + Sync>;

/// A host value stored in a box.
///
/// Any `Display` type qualifies; the display form is what a variable tag
/// renders by default.
pub trait BoxValue: Any + Send + Sync + fmt::Display {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Display> BoxValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// What a render function needs to know about the tag being rendered.
#[derive(Clone)]
pub struct RenderingInfo<'a> {
    /// The tag being rendered.
    pub tag: &'a Tag,

    /// The context stack at the tag.
    pub context: Context,

    enumeration_item: bool,
}

impl<'a> RenderingInfo<'a> {
    pub(crate) fn new(tag: &'a Tag, context: Context, enumeration_item: bool) -> Self {
        Self {
            tag,
            context,
            enumeration_item,
        }
    }

    /// True when the box renders as one item of an enclosing collection.
    ///
    /// Collections and scalars enter the context stack instead of iterating
    /// or acting as booleans when this is set.
    pub fn enumeration_item(&self) -> bool {
        self.enumeration_item
    }

    /// The same rendering information with a different context.
    pub fn with_context(&self, context: Context) -> RenderingInfo<'a> {
        RenderingInfo {
            tag: self.tag,
            context,
            enumeration_item: self.enumeration_item,
        }
    }

    pub(crate) fn as_enumeration_item(&self) -> RenderingInfo<'a> {
        RenderingInfo {
            tag: self.tag,
            context: self.context.clone(),
            enumeration_item: true,
        }
    }
}

struct BoxInner {
    value: Option<Arc<dyn BoxValue>>,
    is_empty: bool,
    bool_value: bool,
    keyed_subscript: Option<KeyedSubscriptFn>,
    filter: Option<FilterFn>,
    render: Option<RenderFn>,
    will_render: Option<WillRenderFn>,
    did_render: Option<DidRenderFn>,
    array_value: Option<Arc<ArrayValue>>,
    dictionary_value: Option<Arc<DictionaryValue>>,
}

static EMPTY_BOX: Lazy<MustacheBox> = Lazy::new(|| BoxBuilder::default().build());

#[derive(Clone)]
pub struct MustacheBox {
    inner: Arc<BoxInner>,
}

impl MustacheBox {
    /// The canonical empty box.
    pub fn empty() -> MustacheBox {
        EMPTY_BOX.clone()
    }

    pub fn builder() -> BoxBuilder {
        BoxBuilder::default()
    }

    /// A box that only carries a filter.
    pub fn from_filter(filter: FilterFn) -> MustacheBox {
        Self::builder().filter(filter).build()
    }

    /// A box that only carries a render function.
    pub fn from_render(render: RenderFn) -> MustacheBox {
        Self::builder().render(render).build()
    }

    pub fn from_will_render(will_render: WillRenderFn) -> MustacheBox {
        Self::builder().will_render(will_render).build()
    }

    pub fn from_did_render(did_render: DidRenderFn) -> MustacheBox {
        Self::builder().did_render(did_render).build()
    }

    pub fn from_keyed_subscript(keyed_subscript: KeyedSubscriptFn) -> MustacheBox {
        Self::builder().keyed_subscript(keyed_subscript).build()
    }

    pub fn value(&self) -> Option<&dyn BoxValue> {
        self.inner.value.as_deref()
    }

    /// The boxed value, if it has type `T`.
    pub fn value_as<T: Any>(&self) -> Option<&T> {
        self.value()
            .and_then(|value| BoxValue::as_any(value).downcast_ref::<T>())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty
    }

    /// Truthiness used by sections and inverted sections.
    pub fn bool_value(&self) -> bool {
        self.inner.bool_value
    }

    pub fn filter(&self) -> Option<&FilterFn> {
        self.inner.filter.as_ref()
    }

    pub fn will_render(&self) -> Option<&WillRenderFn> {
        self.inner.will_render.as_ref()
    }

    pub fn did_render(&self) -> Option<&DidRenderFn> {
        self.inner.did_render.as_ref()
    }

    pub fn has_custom_render(&self) -> bool {
        self.inner.render.is_some()
    }

    /// The items of an array-like box.
    pub fn array_value(&self) -> Option<&[MustacheBox]> {
        self.inner.array_value.as_ref().map(|array| array.items())
    }

    /// The entries of a dictionary-like box.
    pub fn dictionary_value(&self) -> Option<&BTreeMap<String, MustacheBox>> {
        self.inner
            .dictionary_value
            .as_ref()
            .map(|dictionary| dictionary.entries())
    }

    /// Look a key up through the keyed subscript, or return the empty box.
    pub fn mustache_box_for_key(&self, key: &str) -> MustacheBox {
        match &self.inner.keyed_subscript {
            Some(subscript) => subscript(key),
            None => MustacheBox::empty(),
        }
    }

    /// Render the box for a tag.
    ///
    /// Without a custom render function, variable tags render the value's
    /// display form as Text, and section tags push the box on the context
    /// stack and render their content once.
    pub fn render(&self, info: &RenderingInfo<'_>) -> MustacheResult<Rendering> {
        if let Some(render) = &self.inner.render {
            return render(info);
        }
        match info.tag.tag_type() {
            TagType::Variable => Ok(Rendering::text(
                self.inner
                    .value
                    .as_ref()
                    .map(|value| value.to_string())
                    .unwrap_or_default(),
            )),
            TagType::Section => info.tag.render(&info.context.extended_context(self.clone())),
        }
    }

    /// A short human-readable description of the box, for logs.
    pub fn value_description(&self) -> String {
        let mut facets = self.facets_descriptions();
        match facets.len() {
            0 => "Empty".to_string(),
            1 => facets.remove(0),
            _ => format!("({})", facets.join(",")),
        }
    }

    pub fn facets_descriptions(&self) -> Vec<String> {
        let mut facets = Vec::new();
        if let Some(items) = self.array_value() {
            let items: Vec<String> = items.iter().map(|item| item.value_description()).collect();
            facets.push(format!("[{}]", items.join(",")));
        } else if let Some(dictionary) = &self.inner.dictionary_value {
            facets.push(dictionary.to_string());
        } else if let Some(string) = self.value_as::<String>() {
            facets.push(format!("{:?}", string));
        } else if let Some(value) = &self.inner.value {
            facets.push(value.to_string());
        }
        if self.inner.filter.is_some() {
            facets.push("FilterFunction".to_string());
        }
        if self.inner.will_render.is_some() {
            facets.push("WillRenderFunction".to_string());
        }
        if self.inner.did_render.is_some() {
            facets.push("DidRenderFunction".to_string());
        }
        if self.inner.value.is_none() && self.inner.render.is_some() {
            facets.push("RenderFunction".to_string());
        }
        if self.inner.value.is_none() && self.inner.keyed_subscript.is_some() {
            facets.push("KeyedSubscriptFunction".to_string());
        }
        facets
    }
}

impl Default for MustacheBox {
    fn default() -> Self {
        MustacheBox::empty()
    }
}

impl fmt::Debug for MustacheBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MustacheBox({})", self.value_description())
    }
}

/// Builder for boxes with custom facets.
///
/// ```ignore
/// let person = MustacheBox::builder()
///     .value("Errol Flynn".to_string())
///     .keyed_subscript(Arc::new(|key| match key {
///         "firstName" => boxed("Errol"),
///         _ => MustacheBox::empty(),
///     }))
///     .build();
/// ```
#[derive(Default)]
pub struct BoxBuilder {
    value: Option<Arc<dyn BoxValue>>,
    bool_value: Option<bool>,
    keyed_subscript: Option<KeyedSubscriptFn>,
    filter: Option<FilterFn>,
    render: Option<RenderFn>,
    will_render: Option<WillRenderFn>,
    did_render: Option<DidRenderFn>,
    array_value: Option<Arc<ArrayValue>>,
    dictionary_value: Option<Arc<DictionaryValue>>,
}

impl BoxBuilder {
    pub fn value<T: BoxValue>(mut self, value: T) -> Self {
        self.value = Some(Arc::new(value));
        self
    }

    pub fn shared_value(mut self, value: Arc<dyn BoxValue>) -> Self {
        self.value = Some(value);
        self
    }

    /// Override the default truthiness, which is "not empty".
    pub fn bool_value(mut self, bool_value: bool) -> Self {
        self.bool_value = Some(bool_value);
        self
    }

    pub fn keyed_subscript(mut self, keyed_subscript: KeyedSubscriptFn) -> Self {
        self.keyed_subscript = Some(keyed_subscript);
        self
    }

    pub fn filter(mut self, filter: FilterFn) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn render(mut self, render: RenderFn) -> Self {
        self.render = Some(render);
        self
    }

    pub fn will_render(mut self, will_render: WillRenderFn) -> Self {
        self.will_render = Some(will_render);
        self
    }

    pub fn did_render(mut self, did_render: DidRenderFn) -> Self {
        self.did_render = Some(did_render);
        self
    }

    pub(crate) fn array_value(mut self, array: Arc<ArrayValue>) -> Self {
        self.array_value = Some(array);
        self
    }

    pub(crate) fn dictionary_value(mut self, dictionary: Arc<DictionaryValue>) -> Self {
        self.dictionary_value = Some(dictionary);
        self
    }

    pub fn build(self) -> MustacheBox {
        let is_empty = self.value.is_none()
            && self.keyed_subscript.is_none()
            && self.render.is_none()
            && self.filter.is_none()
            && self.will_render.is_none()
            && self.did_render.is_none();
        MustacheBox {
            inner: Arc::new(BoxInner {
                value: self.value,
                is_empty,
                bool_value: self.bool_value.unwrap_or(!is_empty),
                keyed_subscript: self.keyed_subscript,
                filter: self.filter,
                render: self.render,
                will_render: self.will_render,
                did_render: self.did_render,
                array_value: self.array_value,
                dictionary_value: self.dictionary_value,
            }),
        }
    }
}
