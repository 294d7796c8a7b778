//! Error taxonomy for the datacat client.
//!
//! Transport-level and parse-level faults are captured inside
//! [`crate::api::response::Response`] and inspected by callers; the variants
//! here are reserved for failures that abort the current workflow.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatacatError {
    /// Missing or rejected API credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The catalog answered with a 5xx.
    #[error("Server error: HTTP {code}: {message}")]
    Server { code: u16, message: String },

    /// Local archive bundling failed.
    #[error("Packaging error: {0}")]
    Packaging(String),

    /// Transfer or notification failed during an upload.
    #[error("Upload error: {0}")]
    Upload(String),

    /// The response body was not well-formed JSON or YAML.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid config format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

impl DatacatError {
    /// Exit code for the CLI boundary. API and workflow errors exit with 1,
    /// internal failures with a distinguishable code.
    pub fn exit_code(&self) -> i32 {
        match self {
            DatacatError::Io(_) | DatacatError::Internal(_) => 3,
            _ => 1,
        }
    }
}

impl From<toml::de::Error> for DatacatError {
    fn from(err: toml::de::Error) -> Self {
        DatacatError::Config(ConfigError::InvalidFormat(err))
    }
}

impl From<serde_json::Error> for DatacatError {
    fn from(err: serde_json::Error) -> Self {
        DatacatError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DatacatError>;
