//! Token stage: obtain a single-use upload token for a dataset.
//!
//! The token names the upload target URL and an ordered list of form fields
//! the target requires. The server is order-sensitive, so the list is kept
//! as an opaque ordered sequence and replayed verbatim at transfer time.

use serde_json::Value;

use crate::api::{ApiRequest, AuthMode, Document};
use crate::config::Config;
use crate::error::{DatacatError, Result};

/// Field names (in order) used by tokens that predate the explicit
/// `fields` array.
const LEGACY_FIELD_ORDER: &[&str] = &[
    "AWSAccessKeyId",
    "acl",
    "key",
    "policy",
    "success_action_status",
    "signature",
];

#[derive(Debug, Clone)]
pub struct UploadToken {
    /// Upload target URL.
    pub url: String,
    /// Ordered form fields to submit ahead of the file payload.
    pub fields: Vec<(String, String)>,
    /// Storage path assigned by the server, echoed back at notify time.
    pub key: Option<String>,
    pub fmt: Option<String>,
    pub timestamp: Option<String>,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl UploadToken {
    pub fn from_document(document: &Document) -> Result<Self> {
        let url = document
            .get("url")
            .map(value_to_string)
            .ok_or_else(|| DatacatError::Upload("Malformed upload token: no url".to_string()))?;

        let fields: Vec<(String, String)> = match document.get("fields") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?;
                    let value = item.get("value")?;
                    Some((value_to_string(name), value_to_string(value)))
                })
                .collect(),
            _ => LEGACY_FIELD_ORDER
                .iter()
                .filter_map(|name| {
                    document
                        .get(name)
                        .map(|value| (name.to_string(), value_to_string(value)))
                })
                .collect(),
        };

        let key = fields
            .iter()
            .find(|(name, _)| name == "key")
            .map(|(_, value)| value.clone())
            .or_else(|| document.get("key").map(value_to_string));

        Ok(Self {
            url,
            fields,
            key,
            fmt: document.get("fmt").map(value_to_string),
            timestamp: document.get("timestamp").map(value_to_string),
        })
    }
}

/// Request an upload token scoped to the dataset and declared formats.
pub async fn request_token(
    config: &Config,
    dataset: &str,
    fmt: &str,
    pkg_fmt: &str,
) -> Result<UploadToken> {
    let path = format!("/datasets/{}/packages/new.json", dataset);
    let response = ApiRequest::new(config, &path)
        .param("package[fmt]", fmt)
        .param("package[pkg_fmt]", pkg_fmt)
        .auth(AuthMode::Required)
        .get()
        .await?;
    if response.is_error() {
        tracing::error!("{}", response.diagnostic_line());
        return Err(DatacatError::Authentication(format!(
            "Unauthorized for an upload token for dataset {}",
            dataset
        )));
    }
    UploadToken::from_document(response.parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Response;

    fn document_from(body: &str) -> Document {
        let response = Response::new(
            200,
            Some("application/json".to_string()),
            body.to_string(),
            false,
        );
        response.parse().unwrap().clone()
    }

    #[test]
    fn explicit_fields_array_preserves_order() {
        let document = document_from(
            r#"{
                "url": "https://storage.example.test/bucket",
                "fields": [
                    {"name": "zeta", "value": "1"},
                    {"name": "alpha", "value": "2"},
                    {"name": "key", "value": "packages/monkeys.tar.gz"}
                ],
                "fmt": "csv",
                "timestamp": 1234567890
            }"#,
        );
        let token = UploadToken::from_document(&document).unwrap();
        assert_eq!(token.url, "https://storage.example.test/bucket");
        assert_eq!(
            token.fields.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            vec!["zeta", "alpha", "key"]
        );
        assert_eq!(token.key.as_deref(), Some("packages/monkeys.tar.gz"));
        assert_eq!(token.fmt.as_deref(), Some("csv"));
        assert_eq!(token.timestamp.as_deref(), Some("1234567890"));
    }

    #[test]
    fn legacy_tokens_fall_back_to_the_fixed_field_order() {
        let document = document_from(
            r#"{
                "url": "https://storage.example.test/bucket",
                "signature": "sig",
                "policy": "pol",
                "AWSAccessKeyId": "akid",
                "acl": "private",
                "key": "packages/monkeys.tar.gz",
                "success_action_status": "201"
            }"#,
        );
        let token = UploadToken::from_document(&document).unwrap();
        assert_eq!(
            token.fields.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            vec![
                "AWSAccessKeyId",
                "acl",
                "key",
                "policy",
                "success_action_status",
                "signature"
            ]
        );
        assert_eq!(token.key.as_deref(), Some("packages/monkeys.tar.gz"));
    }

    #[test]
    fn missing_url_is_rejected() {
        let document = document_from(r#"{"fields": []}"#);
        assert!(matches!(
            UploadToken::from_document(&document),
            Err(DatacatError::Upload(_))
        ));
    }
}
