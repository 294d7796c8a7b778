//! Notify stage: register the uploaded package with the catalog.
//!
//! There is no compensating transaction between a successful transfer and a
//! failed notification; the archive stays at the storage target and only the
//! notification needs to be retried.

use serde_json::json;

use crate::api::{ApiRequest, AuthMode, Response};
use crate::config::Config;
use crate::error::{DatacatError, Result};
use crate::workflows::upload::bundle::Bundler;
use crate::workflows::upload::token::UploadToken;

pub async fn notify(
    config: &Config,
    token: &UploadToken,
    bundler: &mut Bundler<'_>,
) -> Result<Response> {
    let path = format!("/datasets/{}/packages.json", bundler.dataset());
    let fmt = bundler.fmt();
    let data = json!({
        "package": {
            "path": token.key,
            "fmt": token.fmt.as_deref().unwrap_or(&fmt),
            "pkg_size": bundler.size()?,
            "pkg_fmt": bundler.pkg_fmt()?,
            "summary": bundler.summary()?,
            "token_timestamp": token.timestamp,
        }
    });

    let response = ApiRequest::new(config, &path)
        .auth(AuthMode::Required)
        .body(data)
        .post()
        .await?;
    if response.is_error() {
        tracing::error!("{}", response.diagnostic_line());
        return Err(DatacatError::Upload(
            "Archive was transferred but the catalog was not notified; retry the notification"
                .to_string(),
        ));
    }
    Ok(response)
}
