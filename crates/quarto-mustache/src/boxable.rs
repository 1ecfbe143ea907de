/*
 * boxable.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Conversion of host values into boxes.
//!
//! Every type that templates can render implements [`MustacheBoxable`]:
//!
//! - scalars (`bool`, integers, floats) render their textual form, and are
//!   falsey when zero or false
//! - strings are truthy when non-empty and expose `length`
//! - ordered sequences iterate in sections and expose `first`, `last` and
//!   `count`
//! - sets iterate in sections and expose `first` and `count`
//! - string-keyed maps are always truthy and enter the context stack
//! - `serde_json::Value` maps onto the shapes above
//! - the function types of [`crate::mustache_box`] box into the matching facet

use crate::error::{MustacheError, MustacheResult};
use crate::mustache_box::{
    BoxValue, DidRenderFn, FilterFn, KeyedSubscriptFn, MustacheBox, RenderFn, RenderingInfo,
    WillRenderFn,
};
use crate::rendering::Rendering;
use crate::tag::TagType;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::BuildHasher;
use std::sync::Arc;

/// Types that can feed templates.
pub trait MustacheBoxable {
    fn mustache_box(&self) -> MustacheBox;
}

/// Box any boxable value.
pub fn boxed<T: MustacheBoxable + ?Sized>(value: &T) -> MustacheBox {
    value.mustache_box()
}

impl<T: MustacheBoxable + ?Sized> MustacheBoxable for &T {
    fn mustache_box(&self) -> MustacheBox {
        (**self).mustache_box()
    }
}

impl MustacheBoxable for MustacheBox {
    fn mustache_box(&self) -> MustacheBox {
        self.clone()
    }
}

impl MustacheBoxable for () {
    fn mustache_box(&self) -> MustacheBox {
        MustacheBox::empty()
    }
}

impl<T: MustacheBoxable> MustacheBoxable for Option<T> {
    fn mustache_box(&self) -> MustacheBox {
        match self {
            Some(value) => value.mustache_box(),
            None => MustacheBox::empty(),
        }
    }
}

// ============================================================================
// Scalars
// ============================================================================

/// Scalars only enter the context stack when they render as items of a
/// collection. `{{#count}}...{{/count}}` is a plain conditional.
fn scalar_box(value: Arc<dyn BoxValue>, bool_value: bool, text: Arc<str>) -> MustacheBox {
    let render_value = value.clone();
    let render: RenderFn = Arc::new(move |info: &RenderingInfo<'_>| match info.tag.tag_type() {
        TagType::Variable => Ok(Rendering::text(text.as_ref())),
        TagType::Section => {
            if info.enumeration_item() {
                let item = scalar_box(render_value.clone(), bool_value, text.clone());
                info.tag.render(&info.context.extended_context(item))
            } else {
                info.tag.render(&info.context)
            }
        }
    });
    MustacheBox::builder()
        .shared_value(value)
        .bool_value(bool_value)
        .render(render)
        .build()
}

impl MustacheBoxable for bool {
    fn mustache_box(&self) -> MustacheBox {
        let text = if *self { "1" } else { "0" };
        scalar_box(Arc::new(*self), *self, Arc::from(text))
    }
}

fn int_box(value: i64) -> MustacheBox {
    scalar_box(Arc::new(value), value != 0, Arc::from(value.to_string()))
}

fn float_box(value: f64, text: String) -> MustacheBox {
    scalar_box(Arc::new(value), value != 0.0, Arc::from(text))
}

macro_rules! impl_boxable_for_int {
    ($($t:ty),*) => {
        $(
            impl MustacheBoxable for $t {
                fn mustache_box(&self) -> MustacheBox {
                    int_box(i64::from(*self))
                }
            }
        )*
    };
}

impl_boxable_for_int!(i8, i16, i32, i64, u8, u16, u32);

impl MustacheBoxable for isize {
    fn mustache_box(&self) -> MustacheBox {
        int_box(*self as i64)
    }
}

impl MustacheBoxable for u64 {
    fn mustache_box(&self) -> MustacheBox {
        match i64::try_from(*self) {
            Ok(value) => int_box(value),
            Err(_) => float_box(*self as f64, self.to_string()),
        }
    }
}

impl MustacheBoxable for usize {
    fn mustache_box(&self) -> MustacheBox {
        (*self as u64).mustache_box()
    }
}

impl MustacheBoxable for f64 {
    fn mustache_box(&self) -> MustacheBox {
        float_box(*self, self.to_string())
    }
}

impl MustacheBoxable for f32 {
    fn mustache_box(&self) -> MustacheBox {
        float_box(f64::from(*self), self.to_string())
    }
}

// ============================================================================
// Strings
// ============================================================================

fn string_box(string: String) -> MustacheBox {
    let length = string.chars().count();
    let bool_value = !string.is_empty();
    MustacheBox::builder()
        .value(string)
        .bool_value(bool_value)
        .keyed_subscript(Arc::new(move |key| match key {
            "length" => length.mustache_box(),
            _ => MustacheBox::empty(),
        }))
        .build()
}

impl MustacheBoxable for str {
    fn mustache_box(&self) -> MustacheBox {
        string_box(self.to_string())
    }
}

impl MustacheBoxable for String {
    fn mustache_box(&self) -> MustacheBox {
        string_box(self.clone())
    }
}

// ============================================================================
// Collections
// ============================================================================

/// The items of an array or set box.
#[derive(Debug, Clone)]
pub struct ArrayValue {
    items: Vec<MustacheBox>,
    is_set: bool,
}

impl ArrayValue {
    pub fn items(&self) -> &[MustacheBox] {
        &self.items
    }

    /// Sets have no defined order and no `last` key.
    pub fn is_set(&self) -> bool {
        self.is_set
    }
}

impl fmt::Display for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self.items.iter().map(MustacheBox::value_description).collect();
        write!(f, "[{}]", items.join(","))
    }
}

/// The entries of a dictionary box.
#[derive(Debug, Clone, Default)]
pub struct DictionaryValue(BTreeMap<String, MustacheBox>);

impl DictionaryValue {
    pub fn entries(&self) -> &BTreeMap<String, MustacheBox> {
        &self.0
    }
}

impl fmt::Display for DictionaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("[:]");
        }
        let entries: Vec<String> = self
            .0
            .iter()
            .map(|(key, value)| format!("{:?}:{}", key, value.value_description()))
            .collect();
        write!(f, "[{}]", entries.join(","))
    }
}

/// Concatenate the renderings of collection items.
///
/// Items render as enumeration items, and must all render with the same
/// content type. An empty collection renders like the tag itself would,
/// so that the result has the tag's content type.
fn render_items(items: &[MustacheBox], info: &RenderingInfo<'_>) -> MustacheResult<Rendering> {
    let item_info = info.as_enumeration_item();
    let mut buffer = String::new();
    let mut content_type = None;
    for item in items {
        let rendering = item.render(&item_info)?;
        match content_type {
            None => content_type = Some(rendering.content_type),
            Some(expected) if expected != rendering.content_type => {
                return Err(MustacheError::render("Content type mismatch").into());
            }
            Some(_) => {}
        }
        buffer.push_str(&rendering.string);
    }
    match content_type {
        Some(content_type) => Ok(Rendering::new(buffer, content_type)),
        None => info.tag.render(&info.context),
    }
}

fn collection_box(array: Arc<ArrayValue>) -> MustacheBox {
    let subscript_array = array.clone();
    let keyed_subscript: KeyedSubscriptFn = Arc::new(move |key| {
        let items = subscript_array.items();
        match key {
            "first" => items.first().cloned().unwrap_or_default(),
            "last" if !subscript_array.is_set() => items.last().cloned().unwrap_or_default(),
            "count" => items.len().mustache_box(),
            _ => MustacheBox::empty(),
        }
    });

    let render_array = array.clone();
    let render: RenderFn = Arc::new(move |info: &RenderingInfo<'_>| match info.tag.tag_type() {
        TagType::Section if info.enumeration_item() => {
            // A collection nested in a collection enters the context stack
            // instead of flattening into its parent.
            let nested = collection_box(render_array.clone());
            info.tag.render(&info.context.extended_context(nested))
        }
        _ => render_items(render_array.items(), info),
    });

    let bool_value = !array.items().is_empty();
    MustacheBox::builder()
        .shared_value(array.clone())
        .bool_value(bool_value)
        .keyed_subscript(keyed_subscript)
        .render(render)
        .array_value(array)
        .build()
}

impl MustacheBox {
    /// An array box over already boxed items.
    pub fn from_array(items: Vec<MustacheBox>) -> MustacheBox {
        collection_box(Arc::new(ArrayValue {
            items,
            is_set: false,
        }))
    }

    /// A set box over already boxed items. Iteration follows the given order.
    pub fn from_set(items: Vec<MustacheBox>) -> MustacheBox {
        collection_box(Arc::new(ArrayValue {
            items,
            is_set: true,
        }))
    }

    /// A dictionary box over already boxed values.
    pub fn from_dictionary(entries: BTreeMap<String, MustacheBox>) -> MustacheBox {
        let dictionary = Arc::new(DictionaryValue(entries));
        let subscript_dictionary = dictionary.clone();
        MustacheBox::builder()
            .shared_value(dictionary.clone())
            .keyed_subscript(Arc::new(move |key| {
                subscript_dictionary.0.get(key).cloned().unwrap_or_default()
            }))
            .dictionary_value(dictionary)
            .build()
    }

    /// Box any serializable value through its JSON representation.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> MustacheBox {
        match serde_json::to_value(value) {
            Ok(json) => json.mustache_box(),
            Err(error) => {
                tracing::warn!("Could not box serialized value: {}", error);
                MustacheBox::empty()
            }
        }
    }
}

impl<T: MustacheBoxable> MustacheBoxable for [T] {
    fn mustache_box(&self) -> MustacheBox {
        MustacheBox::from_array(self.iter().map(MustacheBoxable::mustache_box).collect())
    }
}

impl<T: MustacheBoxable> MustacheBoxable for Vec<T> {
    fn mustache_box(&self) -> MustacheBox {
        self.as_slice().mustache_box()
    }
}

impl<T: MustacheBoxable, S: BuildHasher> MustacheBoxable for HashSet<T, S> {
    fn mustache_box(&self) -> MustacheBox {
        MustacheBox::from_set(self.iter().map(MustacheBoxable::mustache_box).collect())
    }
}

impl<T: MustacheBoxable> MustacheBoxable for BTreeSet<T> {
    fn mustache_box(&self) -> MustacheBox {
        MustacheBox::from_set(self.iter().map(MustacheBoxable::mustache_box).collect())
    }
}

fn dictionary_from_entries<'a, K, V>(entries: impl Iterator<Item = (&'a K, &'a V)>) -> MustacheBox
where
    K: MustacheBoxable + 'a,
    V: MustacheBoxable + 'a,
{
    let mut dictionary = BTreeMap::new();
    for (key, value) in entries {
        let key_box = key.mustache_box();
        match key_box.value_as::<String>() {
            Some(key) => {
                dictionary.insert(key.clone(), value.mustache_box());
            }
            None => {
                tracing::warn!(
                    "Dropping dictionary key {} that is not a string",
                    key_box.value_description()
                );
            }
        }
    }
    MustacheBox::from_dictionary(dictionary)
}

impl<K: MustacheBoxable, V: MustacheBoxable, S: BuildHasher> MustacheBoxable for HashMap<K, V, S> {
    fn mustache_box(&self) -> MustacheBox {
        dictionary_from_entries(self.iter())
    }
}

impl<K: MustacheBoxable, V: MustacheBoxable> MustacheBoxable for BTreeMap<K, V> {
    fn mustache_box(&self) -> MustacheBox {
        dictionary_from_entries(self.iter())
    }
}

impl MustacheBoxable for serde_json::Value {
    fn mustache_box(&self) -> MustacheBox {
        use serde_json::Value;
        match self {
            Value::Null => MustacheBox::empty(),
            Value::Bool(b) => b.mustache_box(),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.mustache_box()
                } else if let Some(u) = n.as_u64() {
                    u.mustache_box()
                } else {
                    n.as_f64().unwrap_or_default().mustache_box()
                }
            }
            Value::String(s) => s.mustache_box(),
            Value::Array(items) => items.mustache_box(),
            Value::Object(map) => MustacheBox::from_dictionary(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.mustache_box()))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

impl MustacheBoxable for FilterFn {
    fn mustache_box(&self) -> MustacheBox {
        MustacheBox::from_filter(self.clone())
    }
}

impl MustacheBoxable for RenderFn {
    fn mustache_box(&self) -> MustacheBox {
        MustacheBox::from_render(self.clone())
    }
}

impl MustacheBoxable for WillRenderFn {
    fn mustache_box(&self) -> MustacheBox {
        MustacheBox::from_will_render(self.clone())
    }
}

impl MustacheBoxable for DidRenderFn {
    fn mustache_box(&self) -> MustacheBox {
        MustacheBox::from_did_render(self.clone())
    }
}

impl MustacheBoxable for KeyedSubscriptFn {
    fn mustache_box(&self) -> MustacheBox {
        MustacheBox::from_keyed_subscript(self.clone())
    }
}
