/*
 * standard_library/logger.rs
 * Copyright (c) 2025 Posit, PBC
 */

use crate::boxable::MustacheBoxable;
use crate::mustache_box::{DidRenderFn, MustacheBox, WillRenderFn};
use crate::tag::{Tag, TagType};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Logs the rendering of the tags it encloses.
///
/// ```ignore
/// let mut template = Template::from_string("{{#logger}}{{#items}}{{.}}{{/items}}{{/logger}}")?;
/// template.register_in_base_context("logger", Logger::new());
/// ```
///
/// Sections log when they start and every tag logs what it rendered, indented
/// by section depth. Messages go to `tracing` at info level unless a custom
/// sink is given.
#[derive(Clone)]
pub struct Logger {
    sink: LogSink,
    indentation: Arc<AtomicUsize>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub fn new() -> Self {
        Self::with_sink(|message| tracing::info!("{}", message))
    }

    pub fn with_sink(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            indentation: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn prefix(&self) -> String {
        " ".repeat(self.indentation.load(Ordering::SeqCst) * 2)
    }

    fn will_render(&self, tag: &Tag, mbox: &MustacheBox) {
        if tag.tag_type() == TagType::Section {
            (self.sink)(&format!("{}{} will render {}", self.prefix(), tag, mbox.value_description()));
            self.indentation.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn did_render(&self, tag: &Tag, mbox: &MustacheBox, string: Option<&str>) {
        if tag.tag_type() == TagType::Section {
            let _ = self
                .indentation
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |level| level.checked_sub(1));
        }
        if let Some(string) = string {
            (self.sink)(&format!(
                "{}{} did render {} as {:?}",
                self.prefix(),
                tag,
                mbox.value_description(),
                string
            ));
        }
    }
}

impl MustacheBoxable for Logger {
    fn mustache_box(&self) -> MustacheBox {
        let will_logger = self.clone();
        let will_render: WillRenderFn = Arc::new(move |tag, mbox| {
            will_logger.will_render(tag, &mbox);
            mbox
        });
        let did_logger = self.clone();
        let did_render: DidRenderFn = Arc::new(move |tag, mbox, string| did_logger.did_render(tag, mbox, string));
        MustacheBox::builder()
            .will_render(will_render)
            .did_render(did_render)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Template;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_logger_output() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let logger = Logger::with_sink(move |line| sink.lock().unwrap().push(line.to_string()));

        let mut template =
            Template::from_string("{{#logger}}{{#items}}{{.}}{{/items}}{{/logger}}").unwrap();
        template.extend_base_context(json!({ "items": ["a", "b"] }));
        let data = std::collections::HashMap::from([("logger", logger)]);
        assert_eq!(template.render(&data).unwrap(), "ab");

        let lines = lines.lock().unwrap();
        insta::assert_snapshot!(lines.join("\n"), @r#"
        {{#items}} at line 1 will render ["a","b"]
          {{.}} at line 1 did render "a" as "a"
          {{.}} at line 1 did render "b" as "b"
        {{#items}} at line 1 did render ["a","b"] as "ab"
        "#);
    }
}
