use clap::Args;

use crate::api::{ApiRequest, AuthMode};
use crate::cli::{print_result, Model};
use crate::config::Config;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Resource id or handle
    pub id: String,

    /// Resource type to destroy
    #[arg(short, long, value_enum, default_value = "dataset")]
    pub model: Model,

    /// Print the raw response as pretty JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: DestroyArgs, config: &Config) -> Result<()> {
    let response = ApiRequest::new(config, &args.model.resource_path(&args.id))
        .auth(AuthMode::Required)
        .delete()
        .await?;
    print_result(&response, args.json, config)
}
