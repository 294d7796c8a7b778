//! Transfer stage: multipart POST of the archive to the token's target.
//!
//! The token's form fields are submitted in their given order, followed by
//! the file payload as the final part. The file is streamed from disk, never
//! buffered whole; archives routinely run to gigabytes. Tokens are
//! single-use; a failed transfer aborts the workflow and the caller must
//! start over.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::info;

use crate::error::{DatacatError, Result};
use crate::workflows::upload::token::UploadToken;

/// A streaming multipart part reading the archive from disk.
async fn archive_part(archive: &Path) -> Result<Part> {
    let file_name = archive
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("archive")
        .to_string();
    let file = tokio::fs::File::open(archive).await?;
    let length = file.metadata().await?.len();
    let stream = FramedRead::new(file, BytesCodec::new());
    let body = reqwest::Body::wrap_stream(stream);
    Ok(Part::stream_with_length(body, length).file_name(file_name))
}

pub async fn transfer(token: &UploadToken, archive: &Path) -> Result<()> {
    let mut form = Form::new();
    for (name, value) in &token.fields {
        form = form.text(name.clone(), value.clone());
    }
    form = form.part("file", archive_part(archive).await?);

    info!("Uploading {} to {}", archive.display(), token.url);
    let client = reqwest::Client::builder()
        // Large archives; rely on the server to time out, not the client
        .timeout(Duration::from_secs(60 * 60))
        .build()
        .map_err(|err| DatacatError::Upload(err.to_string()))?;

    match client.post(&token.url).multipart(form).send().await {
        Ok(response) if response.status().is_success() => Ok(()),
        Ok(response) => Err(DatacatError::Upload(format!(
            "Failed to upload {}: HTTP {}",
            archive.display(),
            response.status()
        ))),
        Err(err) => Err(DatacatError::Upload(format!(
            "Failed to upload {}: {}",
            archive.display(),
            err
        ))),
    }
}
