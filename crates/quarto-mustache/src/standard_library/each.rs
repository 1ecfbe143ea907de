/*
 * standard_library/each.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The `each` filter: iteration with positional keys.
//!
//! ```text
//! {{#each(items)}}{{@indexPlusOne}}: {{.}}{{^@last}}, {{/@last}}{{/each(items)}}
//! {{#each(dictionary)}}{{@key}}={{.}} {{/each(dictionary)}}
//! ```

use crate::boxable::boxed;
use crate::error::MustacheError;
use crate::filter::filter;
use crate::mustache_box::{FilterFn, MustacheBox, RenderFn, RenderingInfo};
use std::collections::BTreeMap;
use std::sync::Arc;

fn positions(index: usize, count: usize) -> BTreeMap<String, MustacheBox> {
    BTreeMap::from([
        ("@index".to_string(), boxed(&index)),
        ("@indexPlusOne".to_string(), boxed(&(index + 1))),
        ("@indexIsEven".to_string(), boxed(&(index % 2 == 0))),
        ("@first".to_string(), boxed(&(index == 0))),
        ("@last".to_string(), boxed(&(index + 1 == count))),
    ])
}

/// An item that renders with its positional keys on the context stack.
fn positioned_item(item: MustacheBox, positions: BTreeMap<String, MustacheBox>) -> MustacheBox {
    let positions = MustacheBox::from_dictionary(positions);
    let render: RenderFn = Arc::new(move |info: &RenderingInfo<'_>| {
        let context = info.context.extended_context(&positions);
        item.render(&info.with_context(context))
    });
    MustacheBox::from_render(render)
}

pub(crate) fn each_filter() -> FilterFn {
    filter(|mbox| {
        if mbox.is_empty() {
            return Ok(mbox.clone());
        }

        if let Some(dictionary) = mbox.dictionary_value() {
            let count = dictionary.len();
            let items = dictionary
                .iter()
                .enumerate()
                .map(|(index, (key, item))| {
                    let mut positions = positions(index, count);
                    positions.insert("@key".to_string(), boxed(key));
                    positioned_item(item.clone(), positions)
                })
                .collect();
            return Ok(MustacheBox::from_array(items));
        }

        if let Some(items) = mbox.array_value() {
            let count = items.len();
            let items = items
                .iter()
                .enumerate()
                .map(|(index, item)| positioned_item(item.clone(), positions(index, count)))
                .collect();
            return Ok(MustacheBox::from_array(items));
        }

        Err(MustacheError::render(format!(
            "Non-enumerable argument in each filter: {}",
            mbox.value_description()
        ))
        .into())
    })
}
