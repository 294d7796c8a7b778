use std::fs;
use std::path::PathBuf;

use clap::Args;
use serde_json::Value;

use crate::cli::print_result;
use crate::config::Config;
use crate::error::{DatacatError, Result};
use crate::workflows::BatchWorkflow;

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// YAML or JSON file with an array of batch operations
    pub input: PathBuf,

    /// Write the raw batch response to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run the upload phase even when some batch items failed
    #[arg(long)]
    pub upload_even_if_errors: bool,

    /// Print the raw response as pretty JSON
    #[arg(long)]
    pub json: bool,
}

fn read_operations(path: &PathBuf) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&content)
        .map_err(|err| DatacatError::Parse(format!("{}: {}", path.display(), err)))?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(DatacatError::Parse(format!(
            "{}: expected an array of batch operations",
            path.display()
        ))),
    }
}

pub async fn execute(args: BatchArgs, config: &Config) -> Result<()> {
    let data = read_operations(&args.input)?;
    let mut workflow =
        BatchWorkflow::new(config, data, args.output, args.upload_even_if_errors);
    workflow.execute().await?;
    if let Some(response) = workflow.response() {
        print_result(response, args.json, config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_file_must_hold_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.yaml");
        fs::write(&path, "- dataset:\n    title: One\n- dataset:\n    title: Two\n").unwrap();
        assert_eq!(read_operations(&path).unwrap().len(), 2);

        fs::write(&path, "dataset:\n  title: Not an array\n").unwrap();
        assert!(read_operations(&path).is_err());
    }
}
