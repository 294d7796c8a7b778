//! The upload workflow: a strictly ordered five-stage pipeline.
//!
//! Authorize -> Bundle -> Token -> Transfer -> Notify. A failure at any
//! stage aborts the whole workflow; no stage is retried and no backward
//! transition exists. Tokens are single-use, so recovery is re-running the
//! workflow from the start (or, after a Notify failure, retrying only the
//! notification).

pub mod bundle;
pub mod notify;
pub mod token;
pub mod transfer;

use std::path::PathBuf;

use tracing::{debug, info};

use crate::api::Response;
use crate::config::Config;
use crate::error::Result;

pub use bundle::Bundler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Authorize,
    Bundle,
    Token,
    Transfer,
    Notify,
}

impl std::fmt::Display for UploadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UploadStage::Authorize => "authorize",
            UploadStage::Bundle => "bundle",
            UploadStage::Token => "token",
            UploadStage::Transfer => "transfer",
            UploadStage::Notify => "notify",
        };
        f.write_str(name)
    }
}

pub struct UploadWorkflow<'a> {
    config: &'a Config,
    bundler: Bundler<'a>,
    current_stage: UploadStage,
}

impl<'a> UploadWorkflow<'a> {
    pub fn new(
        config: &'a Config,
        dataset: &str,
        local_paths: Vec<String>,
        fmt: Option<String>,
        archive: Option<PathBuf>,
    ) -> Result<Self> {
        let bundler = Bundler::new(config, dataset, local_paths, fmt, archive)?;
        Ok(Self {
            config,
            bundler,
            current_stage: UploadStage::Authorize,
        })
    }

    /// Run all five stages in order, aborting on the first failure.
    pub async fn execute(&mut self) -> Result<Response> {
        match self.run().await {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::error!("Upload aborted at {} stage: {}", self.current_stage, err);
                Err(err)
            }
        }
    }

    async fn run(&mut self) -> Result<Response> {
        self.stage(UploadStage::Authorize);
        // Fail fast before any local work: a provisional token request
        // checks that the caller may upload to this dataset at all.
        let fmt = self.bundler.fmt();
        let pkg_fmt = self.bundler.pkg_fmt()?;
        token::request_token(self.config, self.bundler.dataset(), &fmt, &pkg_fmt).await?;

        self.stage(UploadStage::Bundle);
        self.bundler.bundle().await?;

        self.stage(UploadStage::Token);
        let token =
            token::request_token(self.config, self.bundler.dataset(), &fmt, &pkg_fmt).await?;

        self.stage(UploadStage::Transfer);
        let archive = self.bundler.archive_path()?;
        transfer::transfer(&token, &archive).await?;

        self.stage(UploadStage::Notify);
        let response = notify::notify(self.config, &token, &mut self.bundler).await?;
        info!(
            "Uploaded {} for dataset {}",
            archive.display(),
            self.bundler.dataset()
        );
        Ok(response)
    }

    fn stage(&mut self, stage: UploadStage) {
        self.current_stage = stage;
        debug!("Upload stage: {}", stage);
    }
}
