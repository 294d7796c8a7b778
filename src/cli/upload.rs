use std::path::PathBuf;

use clap::Args;

use crate::cli::print_result;
use crate::config::Config;
use crate::error::Result;
use crate::workflows::UploadWorkflow;

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Dataset id or handle to upload into
    pub dataset: String,

    /// Local files, directories, or remote URLs to package
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Data format of the contents, when it cannot be inferred
    #[arg(short, long)]
    pub fmt: Option<String>,

    /// Write the archive to this path instead of the default
    #[arg(short, long)]
    pub archive: Option<PathBuf>,

    /// Print the raw response as pretty JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: UploadArgs, config: &Config) -> Result<()> {
    let mut workflow =
        UploadWorkflow::new(config, &args.dataset, args.paths, args.fmt, args.archive)?;
    let response = workflow.execute().await?;
    print_result(&response, args.json, config)
}
