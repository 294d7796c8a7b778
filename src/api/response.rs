//! Normalized responses from the catalog API.
//!
//! The server answers in JSON or (on legacy endpoints) YAML, and its
//! top-level value may be an object, an array, or a bare string. `Response`
//! parses the body lazily and at most once, normalizing all three shapes
//! into the [`Document`] sum type so downstream formatting handles one shape
//! uniformly.

use std::sync::OnceLock;

use serde_json::Value;

use crate::error::{DatacatError, Result};

/// Broad classification of the response `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Yaml,
    Other,
}

/// Parsed top-level shape of a response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Object(serde_json::Map<String, Value>),
    List(Vec<Value>),
    Scalar(String),
}

impl Document {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Document::Object(map),
            Value::Array(items) => Document::List(items),
            Value::String(text) => Document::Scalar(text),
            Value::Null => Document::Object(serde_json::Map::new()),
            other => Document::Scalar(other.to_string()),
        }
    }

    /// Key lookup on object documents; `None` for lists and scalars.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Document::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Document::Object(map) => Value::Object(map.clone()),
            Document::List(items) => Value::Array(items.clone()),
            Document::Scalar(text) => Value::String(text.clone()),
        }
    }
}

/// A catalog response with transport faults folded in.
///
/// A `Response` always exists, even for connection failures; `error` carries
/// the transport-level message in that case and `code` is 0.
pub struct Response {
    code: u16,
    content_type: Option<String>,
    body: String,
    error: Option<String>,
    verbose: bool,
    parsed: OnceLock<std::result::Result<Document, String>>,
}

impl Response {
    pub fn new(code: u16, content_type: Option<String>, body: String, verbose: bool) -> Self {
        Self {
            code,
            content_type,
            body,
            error: None,
            verbose,
            parsed: OnceLock::new(),
        }
    }

    /// A response carrying a transport- or status-level error message.
    pub fn failed(
        code: u16,
        content_type: Option<String>,
        body: String,
        error: String,
        verbose: bool,
    ) -> Self {
        Self {
            code,
            content_type,
            body,
            error: Some(error),
            verbose,
            parsed: OnceLock::new(),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Presence of a builder-supplied error message is the sole determinant;
    /// a 2xx with an unparsable body is still successful at this level.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_success(&self) -> bool {
        !self.is_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.code >= 500
    }

    pub fn content_kind(&self) -> ContentKind {
        match self.content_type.as_deref() {
            Some(value) if value.contains("json") => ContentKind::Json,
            Some(value) if value.contains("yaml") => ContentKind::Yaml,
            _ => ContentKind::Other,
        }
    }

    /// One-line summary: `<code> -- SUCCESS` or `<code> -- <error message>`.
    pub fn diagnostic_line(&self) -> String {
        match &self.error {
            Some(message) => format!("{} -- {}", self.code, message),
            None => format!("{} -- SUCCESS", self.code),
        }
    }

    /// Parse the body into a [`Document`].
    ///
    /// Memoized: the first call parses, every later call returns the same
    /// document (or the same parse failure) without touching the body again.
    pub fn parse(&self) -> Result<&Document> {
        match self.parsed.get_or_init(|| self.parse_body()) {
            Ok(document) => Ok(document),
            Err(message) => Err(DatacatError::Parse(message.clone())),
        }
    }

    fn parse_body(&self) -> std::result::Result<Document, String> {
        let trimmed = self.body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(Document::Object(serde_json::Map::new()));
        }
        let value: Value = match self.content_kind() {
            ContentKind::Yaml => {
                serde_yaml::from_str(&self.body).map_err(|_| self.parse_failure_message())?
            }
            _ => serde_json::from_str(&self.body).map_err(|_| self.parse_failure_message())?,
        };
        Ok(Document::from_value(value))
    }

    fn parse_failure_message(&self) -> String {
        if self.verbose {
            format!("{}\n\n{}", self.diagnostic_line(), self.body)
        } else {
            self.diagnostic_line()
        }
    }
}
