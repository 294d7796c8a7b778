use std::path::PathBuf;

use clap::Args;

use crate::config::Config;
use crate::error::Result;
use crate::workflows::DownloadWorkflow;

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Dataset id or handle
    pub dataset: String,

    /// Target file or directory
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

pub async fn execute(args: DownloadArgs, config: &Config) -> Result<()> {
    let workflow = DownloadWorkflow::new(config, &args.dataset);
    let path = workflow.download(&args.output).await?;
    println!("{}", path.display());
    Ok(())
}
