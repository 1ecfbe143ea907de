/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and rendering.
//!
//! Framework failures are [`MustacheError`] values: a kind, a message and
//! the best-known source location. Errors raised by user-supplied filters,
//! render functions or data sources travel as [`Error::Custom`] and are never
//! rewrapped by the engine.

use std::fmt;
use thiserror::Error;

/// The category of a [`MustacheError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A template or partial could not be resolved by the data source.
    TemplateNotFound,
    /// Malformed template or expression syntax.
    ParseError,
    /// Failure while rendering a tag.
    RenderError,
}

/// A framework error with optional location information.
#[derive(Debug)]
pub struct MustacheError {
    pub kind: ErrorKind,
    pub message: Option<String>,
    pub template_id: Option<String>,
    pub line_number: Option<usize>,
    pub underlying: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl MustacheError {
    /// Create an error of the given kind with no message nor location.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            template_id: None,
            line_number: None,
            underlying: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError).with_message(message)
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RenderError).with_message(message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TemplateNotFound).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_template_id(mut self, template_id: Option<&str>) -> Self {
        self.template_id = template_id.map(str::to_string);
        self
    }

    pub fn with_line_number(mut self, line_number: usize) -> Self {
        self.line_number = Some(line_number);
        self
    }

    pub fn with_underlying(mut self, error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        self.underlying = Some(error.into());
        self
    }

    /// Attach a location, keeping any location a deeper failure already set.
    pub fn with_location(mut self, template_id: Option<&str>, line_number: usize) -> Self {
        if self.template_id.is_none() && self.line_number.is_none() {
            self.template_id = template_id.map(str::to_string);
            self.line_number = Some(line_number);
        } else if self.line_number.is_none() {
            self.line_number = Some(line_number);
        }
        self
    }

    fn location_description(&self) -> Option<String> {
        match (&self.template_id, self.line_number) {
            (Some(id), Some(line)) => Some(format!("line {} of template {}", line, id)),
            (Some(id), None) => Some(format!("template {}", id)),
            (None, Some(line)) => Some(format!("line {}", line)),
            (None, None) => None,
        }
    }
}

impl fmt::Display for MustacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            ErrorKind::TemplateNotFound => None,
            ErrorKind::ParseError => Some("Parse error"),
            ErrorKind::RenderError => Some("Rendering error"),
        };
        let mut description = match (prefix, self.location_description()) {
            (Some(prefix), Some(location)) => format!("{} at {}", prefix, location),
            (Some(prefix), None) => prefix.to_string(),
            (None, _) => String::new(),
        };
        if let Some(message) = &self.message {
            if description.is_empty() {
                description = message.clone();
            } else {
                description.push_str(": ");
                description.push_str(message);
            }
        }
        if let Some(underlying) = &self.underlying {
            description.push_str(&format!(" ({})", underlying));
        }
        f.write_str(&description)
    }
}

impl std::error::Error for MustacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.underlying
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Parse, render, or template-not-found failure raised by the engine.
    #[error(transparent)]
    Mustache(#[from] MustacheError),

    /// Error raised by a user-supplied filter or render function.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),

    /// I/O error (e.g., reading a template file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration document.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a user error so that it passes through rendering unmodified.
    pub fn custom(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Custom(error.into())
    }

    /// The framework error kind, if this is a framework error.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Mustache(e) => Some(e.kind),
            _ => None,
        }
    }

    pub fn as_mustache(&self) -> Option<&MustacheError> {
        match self {
            Error::Mustache(e) => Some(e),
            _ => None,
        }
    }

    /// Attach a location to framework errors that do not have one yet.
    pub(crate) fn located(self, template_id: Option<&str>, line_number: usize) -> Self {
        match self {
            Error::Mustache(e) => Error::Mustache(e.with_location(template_id, line_number)),
            other => other,
        }
    }
}

/// Result type for template operations.
pub type MustacheResult<T> = Result<T, Error>;
