/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The context stack.
//!
//! A [`Context`] is a persistent linked stack: extending a context returns a
//! new context that shares its parent. Tags look their expressions up in the
//! context they render in.

use crate::ast::PartialOverride;
use crate::boxable::MustacheBoxable;
use crate::error::MustacheResult;
use crate::expression_parser::ExpressionParser;
use crate::invocation::ExpressionInvocation;
use crate::mustache_box::{DidRenderFn, MustacheBox, WillRenderFn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

enum ContextKind {
    Root,
    Box {
        mbox: MustacheBox,
        parent: Context,
    },
    PartialOverride {
        partial_override: PartialOverride,
        parent: Context,
    },
}

struct ContextInner {
    kind: ContextKind,
    registered_keys: Option<Context>,
    throw_when_missing: bool,
}

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::from_parts(ContextKind::Root, None, false)
    }

    /// A context containing a single box.
    pub fn with_box(value: impl MustacheBoxable) -> Self {
        Self::new().extended_context(value)
    }

    fn from_parts(kind: ContextKind, registered_keys: Option<Context>, throw_when_missing: bool) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                kind,
                registered_keys,
                throw_when_missing,
            }),
        }
    }

    /// A new context with `value` on top of the stack.
    pub fn extended_context(&self, value: impl MustacheBoxable) -> Context {
        let mbox = value.mustache_box();
        if mbox.is_empty() {
            return self.clone();
        }
        Self::from_parts(
            ContextKind::Box {
                mbox,
                parent: self.clone(),
            },
            self.inner.registered_keys.clone(),
            self.inner.throw_when_missing,
        )
    }

    /// A new context where `key` always resolves to `value`, whatever is
    /// pushed on the stack later.
    pub fn context_with_registered_key(&self, key: &str, value: impl MustacheBoxable) -> Context {
        let registered_keys = self
            .inner
            .registered_keys
            .clone()
            .unwrap_or_default()
            .extended_context(BTreeMap::from([(key.to_string(), value.mustache_box())]));
        Self::from_parts(
            self.kind_clone(),
            Some(registered_keys),
            self.inner.throw_when_missing,
        )
    }

    /// A new context whose lookups fail on missing identifiers instead of
    /// resolving to the empty box.
    pub fn with_throw_when_missing(&self, throw_when_missing: bool) -> Context {
        Self::from_parts(
            self.kind_clone(),
            self.inner.registered_keys.clone(),
            throw_when_missing,
        )
    }

    pub fn throw_when_missing(&self) -> bool {
        self.inner.throw_when_missing
    }

    pub(crate) fn extended_with_partial_override(&self, partial_override: PartialOverride) -> Context {
        Self::from_parts(
            ContextKind::PartialOverride {
                partial_override,
                parent: self.clone(),
            },
            self.inner.registered_keys.clone(),
            self.inner.throw_when_missing,
        )
    }

    fn kind_clone(&self) -> ContextKind {
        match &self.inner.kind {
            ContextKind::Root => ContextKind::Root,
            ContextKind::Box { mbox, parent } => ContextKind::Box {
                mbox: mbox.clone(),
                parent: parent.clone(),
            },
            ContextKind::PartialOverride {
                partial_override,
                parent,
            } => ContextKind::PartialOverride {
                partial_override: partial_override.clone(),
                parent: parent.clone(),
            },
        }
    }

    fn parent(&self) -> Option<&Context> {
        match &self.inner.kind {
            ContextKind::Root => None,
            ContextKind::Box { parent, .. } | ContextKind::PartialOverride { parent, .. } => Some(parent),
        }
    }

    /// Iterate frames from the top of the stack down.
    fn frames(&self) -> impl Iterator<Item = &Context> {
        std::iter::successors(Some(self), |&context| context.parent())
    }

    fn boxes(&self) -> impl Iterator<Item = &MustacheBox> {
        self.frames().filter_map(|context| match &context.inner.kind {
            ContextKind::Box { mbox, .. } => Some(mbox),
            _ => None,
        })
    }

    /// The box at the top of the stack, the value of `{{.}}`.
    pub fn top_box(&self) -> MustacheBox {
        self.boxes().next().cloned().unwrap_or_default()
    }

    /// Resolve a key: registered keys first, then the first box of the stack
    /// that has a non-empty value for the key.
    pub fn mustache_box_for_key(&self, key: &str) -> MustacheBox {
        if let Some(registered) = &self.inner.registered_keys {
            let mbox = registered.mustache_box_for_key(key);
            if !mbox.is_empty() {
                return mbox;
            }
        }
        self.boxes()
            .map(|mbox| mbox.mustache_box_for_key(key))
            .find(|mbox| !mbox.is_empty())
            .unwrap_or_default()
    }

    /// Evaluate an expression such as `user.name` or `uppercase(name)`.
    pub fn mustache_box_for_expression(&self, expression: &str) -> MustacheResult<MustacheBox> {
        let expression = ExpressionParser::new().parse(expression)?;
        ExpressionInvocation::new(&expression).invoke(self)
    }

    /// Will-render hooks, topmost first.
    pub(crate) fn will_render_stack(&self) -> Vec<WillRenderFn> {
        self.boxes()
            .filter_map(|mbox| mbox.will_render().cloned())
            .collect()
    }

    /// Did-render hooks, topmost last.
    pub(crate) fn did_render_stack(&self) -> Vec<DidRenderFn> {
        let mut stack: Vec<DidRenderFn> = self
            .boxes()
            .filter_map(|mbox| mbox.did_render().cloned())
            .collect();
        stack.reverse();
        stack
    }

    /// Partial overrides, innermost first.
    pub(crate) fn partial_override_stack(&self) -> Vec<&PartialOverride> {
        self.frames()
            .filter_map(|context| match &context.inner.kind {
                ContextKind::PartialOverride {
                    partial_override, ..
                } => Some(partial_override),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            ContextKind::Root => f.write_str("Context.Root"),
            ContextKind::Box { mbox, parent } => {
                write!(f, "Context.Box({}):{:?}", mbox.value_description(), parent)
            }
            ContextKind::PartialOverride { parent, .. } => {
                write!(f, "Context.PartialOverride:{:?}", parent)
            }
        }
    }
}
