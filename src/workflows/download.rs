//! Download workflow: obtain a signed download token, then fetch its URL.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::api::{ApiRequest, AuthMode};
use crate::config::Config;
use crate::error::{DatacatError, Result};

pub struct DownloadWorkflow<'a> {
    config: &'a Config,
    dataset: String,
}

/// Basename of a signed URL, with any query string dropped.
fn basename_from_url(url: &str) -> Option<&str> {
    url.rsplit('/')
        .next()
        .map(|name| name.split('?').next().unwrap_or(name))
        .filter(|name| !name.is_empty())
}

impl<'a> DownloadWorkflow<'a> {
    pub fn new(config: &'a Config, dataset: &str) -> Self {
        Self {
            config,
            dataset: dataset.to_string(),
        }
    }

    /// POST for a download token and extract its signed URL.
    pub async fn signed_url(&self) -> Result<String> {
        let path = format!("/datasets/{}/downloads", self.dataset);
        let response = ApiRequest::new(self.config, &path)
            .auth(AuthMode::IfPossible)
            .post()
            .await?;
        if response.is_error() {
            tracing::error!("{}", response.diagnostic_line());
            if response.is_server_error() {
                return Err(DatacatError::Server {
                    code: response.code(),
                    message: format!(
                        "Could not obtain a download token for dataset {}",
                        self.dataset
                    ),
                });
            }
            return Err(DatacatError::Authentication(format!(
                "Could not obtain a download token for dataset {}",
                self.dataset
            )));
        }
        response
            .parse()?
            .get("download_token")
            .and_then(|token| token.get("signed_url"))
            .and_then(|url| url.as_str())
            .map(String::from)
            .ok_or_else(|| {
                DatacatError::Parse("Malformed download token received from the catalog".to_string())
            })
    }

    /// Download to `target`; directory targets receive a file named after
    /// the signed URL's basename.
    pub async fn download(&self, target: &Path) -> Result<PathBuf> {
        let url = self.signed_url().await?;
        let path = if target.is_dir() {
            let basename = basename_from_url(&url).unwrap_or("download");
            target.join(basename)
        } else {
            target.to_path_buf()
        };

        info!("Downloading dataset {} to {}", self.dataset, path.display());
        let response = reqwest::get(&url)
            .await
            .map_err(|err| DatacatError::Upload(format!("Download failed: {}", err)))?;
        if !response.status().is_success() {
            return Err(DatacatError::Server {
                code: response.status().as_u16(),
                message: format!("Download failed for dataset {}", self.dataset),
            });
        }

        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|err| DatacatError::Upload(format!("Download failed: {}", err)))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(path)
    }
}
