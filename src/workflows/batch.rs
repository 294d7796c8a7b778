//! Batch workflow: one API call carrying many create/update operations,
//! followed by conditional per-item uploads.
//!
//! The batch POST is atomic from the client's perspective even though the
//! server processes items independently. Uploads then run sequentially in
//! array order; a single failed upload is reported and the loop continues.

use std::fs;
use std::path::PathBuf;

use serde_json::{json, Value};
use tracing::{error, warn};

use crate::api::{ApiRequest, AuthMode, Response};
use crate::config::Config;
use crate::error::{DatacatError, Result};
use crate::workflows::upload::UploadWorkflow;

const BATCH_PATH: &str = "batch.json";

/// Item statuses that count as a success.
fn succeeded(status: Option<&str>) -> bool {
    matches!(status, Some("created") | Some("updated"))
}

/// True when any item's status falls outside {created, updated}.
pub fn any_item_failed(items: &[Value]) -> bool {
    items
        .iter()
        .any(|item| !succeeded(item.get("status").and_then(Value::as_str)))
}

/// `(dataset id, local paths)` pairs for items that succeeded, are dataset
/// resources, carry a non-blank id, and declared local paths.
pub fn dataset_ids_and_local_paths(items: &[Value]) -> Vec<(String, Vec<String>)> {
    items
        .iter()
        .filter_map(|item| {
            if !succeeded(item.get("status").and_then(Value::as_str)) {
                return None;
            }
            let dataset = item.get("resource")?.get("dataset")?;
            let id = match dataset.get("id")? {
                Value::String(text) if !text.trim().is_empty() => text.clone(),
                Value::Number(number) => number.to_string(),
                _ => return None,
            };
            let local_paths: Vec<String> = item
                .get("local_paths")?
                .as_array()?
                .iter()
                .filter_map(|path| path.as_str().map(String::from))
                .collect();
            if local_paths.is_empty() {
                return None;
            }
            Some((id, local_paths))
        })
        .collect()
}

pub struct BatchWorkflow<'a> {
    config: &'a Config,
    data: Vec<Value>,
    output_path: Option<PathBuf>,
    upload_even_if_errors: bool,
    batch_response: Option<Response>,
}

impl<'a> BatchWorkflow<'a> {
    pub fn new(
        config: &'a Config,
        data: Vec<Value>,
        output_path: Option<PathBuf>,
        upload_even_if_errors: bool,
    ) -> Self {
        Self {
            config,
            data,
            output_path,
            upload_even_if_errors,
            batch_response: None,
        }
    }

    /// The update followed by the upload phase.
    pub async fn execute(&mut self) -> Result<()> {
        self.batch_update().await?;
        self.batch_upload().await
    }

    /// Submit the whole array in a single authenticated POST, optionally
    /// persisting the raw response for debugging.
    pub async fn batch_update(&mut self) -> Result<()> {
        let response = ApiRequest::new(self.config, BATCH_PATH)
            .auth(AuthMode::Required)
            .body(json!({ "batch": self.data }))
            .post()
            .await?;
        if let Some(path) = &self.output_path {
            fs::write(path, response.body())?;
        }
        self.batch_response = Some(response);
        Ok(())
    }

    pub fn response(&self) -> Option<&Response> {
        self.batch_response.as_ref()
    }

    fn items(&self) -> Result<&[Value]> {
        let response = self.batch_response.as_ref().ok_or_else(|| {
            DatacatError::Parse("No batch response; run the update first".to_string())
        })?;
        match response.parse()?.get("batch") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(DatacatError::Parse(
                "Batch response carried no item array".to_string(),
            )),
        }
    }

    /// Conservative all-or-nothing signal over the per-item statuses.
    pub fn is_error(&self) -> Result<bool> {
        if self
            .batch_response
            .as_ref()
            .is_some_and(|response| response.is_error())
        {
            return Ok(true);
        }
        Ok(any_item_failed(self.items()?))
    }

    /// Upload local paths for each successfully created/updated dataset,
    /// sequentially and in array order. Skipped wholesale when the batch had
    /// errors, unless explicitly told to proceed anyway.
    pub async fn batch_upload(&mut self) -> Result<()> {
        let had_errors = self.is_error()?;
        if had_errors {
            if !self.upload_even_if_errors {
                return Ok(());
            }
            warn!("Continuing with uploads even though there were errors");
        }
        let pairs = dataset_ids_and_local_paths(self.items()?);
        for (id, local_paths) in pairs {
            let mut workflow = match UploadWorkflow::new(self.config, &id, local_paths, None, None)
            {
                Ok(workflow) => workflow,
                Err(err) => {
                    error!("Skipping upload for dataset {}: {}", id, err);
                    continue;
                }
            };
            // Independent once dispatched: report and keep going
            if let Err(err) = workflow.execute().await {
                error!("Upload for dataset {} failed: {}", id, err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_items() -> Vec<Value> {
        vec![
            json!({
                "status": "created",
                "resource": {"dataset": {"id": 42}},
                "local_paths": ["a.csv"]
            }),
            json!({
                "status": "invalid",
                "errors": ["bad title"]
            }),
        ]
    }

    #[test]
    fn any_failure_marks_the_whole_batch() {
        assert!(any_item_failed(&sample_items()));
        let all_good = vec![
            json!({"status": "created"}),
            json!({"status": "updated"}),
        ];
        assert!(!any_item_failed(&all_good));
    }

    #[test]
    fn uploadable_pairs_require_success_dataset_id_and_paths() {
        assert_eq!(
            dataset_ids_and_local_paths(&sample_items()),
            vec![("42".to_string(), vec!["a.csv".to_string()])]
        );
    }

    #[test]
    fn non_dataset_resources_are_skipped() {
        let items = vec![json!({
            "status": "created",
            "resource": {"source": {"id": 7}},
            "local_paths": ["a.csv"]
        })];
        assert!(dataset_ids_and_local_paths(&items).is_empty());
    }

    #[test]
    fn blank_ids_and_missing_paths_are_skipped() {
        let items = vec![
            json!({
                "status": "created",
                "resource": {"dataset": {"id": "  "}},
                "local_paths": ["a.csv"]
            }),
            json!({
                "status": "updated",
                "resource": {"dataset": {"id": 7}}
            }),
        ];
        assert!(dataset_ids_and_local_paths(&items).is_empty());
    }

    #[test]
    fn item_order_is_preserved() {
        let items = vec![
            json!({
                "status": "created",
                "resource": {"dataset": {"id": 2}},
                "local_paths": ["b.csv"]
            }),
            json!({
                "status": "updated",
                "resource": {"dataset": {"id": 1}},
                "local_paths": ["a.csv"]
            }),
        ];
        let pairs = dataset_ids_and_local_paths(&items);
        assert_eq!(
            pairs.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
            vec!["2", "1"]
        );
    }
}
