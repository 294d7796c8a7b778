use std::path::PathBuf;

use clap::Args;
use serde_json::json;

use crate::api::{ApiRequest, AuthMode};
use crate::cli::{load_payload, print_result, Model};
use crate::config::Config;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Resource id or handle
    pub id: String,

    /// Resource type to update
    #[arg(short, long, value_enum, default_value = "dataset")]
    pub model: Model,

    /// YAML or JSON file with the resource's properties
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Individual properties as PROP=VALUE
    pub props: Vec<String>,

    /// Print the raw response as pretty JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: UpdateArgs, config: &Config) -> Result<()> {
    let payload = load_payload(args.data.as_deref(), &args.props)?;
    let response = ApiRequest::new(config, &args.model.resource_path(&args.id))
        .auth(AuthMode::Required)
        .body(json!({ (args.model.singular()): payload }))
        .put()
        .await?;
    print_result(&response, args.json, config)
}
