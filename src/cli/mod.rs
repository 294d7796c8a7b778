//! Command-line commands.
//!
//! Each submodule defines an `Args` struct and an
//! `execute(args, &config)` entry point; `main` dispatches to them. Shared
//! helpers here cover the resource-model selector and payload loading.

pub mod batch;
pub mod create;
pub mod destroy;
pub mod download;
pub mod list;
pub mod search;
pub mod show;
pub mod update;
pub mod upload;

use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde_json::{json, Value};

use crate::api::Response;
use crate::config::Config;
use crate::error::{DatacatError, Result};
use crate::output;

/// Catalog resource types addressable by the CRUD commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Model {
    Dataset,
    Source,
    License,
}

impl Model {
    pub fn singular(&self) -> &'static str {
        match self {
            Model::Dataset => "dataset",
            Model::Source => "source",
            Model::License => "license",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            Model::Dataset => "datasets",
            Model::Source => "sources",
            Model::License => "licenses",
        }
    }

    pub fn index_path(&self) -> String {
        format!("/{}.json", self.plural())
    }

    pub fn resource_path(&self, id: &str) -> String {
        format!("/{}/{}.json", self.plural(), id)
    }
}

/// Build a resource payload from an optional YAML/JSON file plus
/// `key=value` arguments (arguments win).
pub fn load_payload(file: Option<&Path>, props: &[String]) -> Result<Value> {
    let mut payload = match file {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            // YAML is a superset of JSON, so one parser covers both
            serde_yaml::from_str(&content)
                .map_err(|err| DatacatError::Parse(format!("{}: {}", path.display(), err)))?
        }
        None => json!({}),
    };

    let Value::Object(ref mut map) = payload else {
        return Err(DatacatError::Parse(
            "Resource payload must be a mapping of properties".to_string(),
        ));
    };
    for prop in props {
        let Some((key, value)) = prop.split_once('=') else {
            return Err(DatacatError::Parse(format!(
                "Expected PROP=VALUE, got '{}'",
                prop
            )));
        };
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    if map.is_empty() {
        return Err(DatacatError::Parse(
            "Must provide some data, either directly or from a file".to_string(),
        ));
    }
    Ok(payload)
}

/// Print a response and surface 5xx statuses as server errors so the CLI
/// exits non-zero for them.
pub fn print_result(response: &Response, as_json: bool, config: &Config) -> Result<()> {
    output::print_response(response, as_json, config.verbose)?;
    if response.is_server_error() {
        return Err(DatacatError::Server {
            code: response.code(),
            message: response.error().unwrap_or("unexpected server response").to_string(),
        });
    }
    Ok(())
}
