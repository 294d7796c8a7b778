//! Outbound requests against the catalog API.
//!
//! An [`ApiRequest`] is created per call and never mutated after its query
//! string has been computed. Transport faults (connection errors, timeouts,
//! non-2xx statuses) are captured into the returned [`Response`] rather than
//! propagated, so workflows never handle raw transport errors.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::response::Response;
use crate::api::signer::{self, AuthMode};
use crate::config::Config;
use crate::error::{DatacatError, Result};

fn http_client() -> reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT
        .get_or_init(|| {
            let user_agent = format!("datacat-cli v{}", env!("CARGO_PKG_VERSION"));
            reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .user_agent(user_agent)
                .build()
                .expect("Failed to create HTTP client")
        })
        .clone()
}

pub struct ApiRequest<'a> {
    config: &'a Config,
    path: String,
    params: BTreeMap<String, String>,
    body: Option<Value>,
    auth: AuthMode,
    raw_query: Option<String>,
    // Derived strings, each computed at most once per request instance
    query: OnceLock<std::result::Result<String, String>>,
    body_text: OnceLock<String>,
}

impl<'a> ApiRequest<'a> {
    pub fn new(config: &'a Config, path: &str) -> Self {
        Self {
            config,
            path: path.to_string(),
            params: BTreeMap::new(),
            body: None,
            auth: AuthMode::None,
            raw_query: None,
            query: OnceLock::new(),
            body_text: OnceLock::new(),
        }
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn auth(mut self, mode: AuthMode) -> Self {
        self.auth = mode;
        self
    }

    /// Use `query` verbatim: no escaping, no signature, even when signing
    /// was requested.
    pub fn raw_query(mut self, query: &str) -> Self {
        self.raw_query = Some(query.to_string());
        self
    }

    /// The encoded body text, serialized once.
    fn body_text(&self) -> &str {
        self.body_text.get_or_init(|| match &self.body {
            Some(value) => serde_json::to_string(value).expect("JSON value serializes"),
            None => String::new(),
        })
    }

    fn body_is_empty(&self) -> bool {
        match &self.body {
            None | Some(Value::Null) => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::String(text)) => text.is_empty(),
            Some(_) => false,
        }
    }

    /// The query string that goes in the URL: signed when auth resolves,
    /// unsigned otherwise, raw when requested. Memoized so the signature
    /// (and its `requested_at` stamp) is stable per request instance.
    pub fn query_string(&self) -> Result<String> {
        match self.query.get_or_init(|| self.compute_query_string()) {
            Ok(query) => Ok(query.clone()),
            Err(message) => Err(DatacatError::Authentication(message.clone())),
        }
    }

    fn compute_query_string(&self) -> std::result::Result<String, String> {
        if let Some(raw) = &self.raw_query {
            return Ok(raw.clone());
        }
        match self.auth {
            AuthMode::None => Ok(signer::canonicalize(&self.params)),
            AuthMode::Required | AuthMode::IfPossible => {
                let Some((api_key, secret)) = self.config.credentials() else {
                    if self.auth == AuthMode::Required {
                        return Err(
                            "API key or secret missing; set them in the identity file or via \
                             DATACAT_API_KEY / DATACAT_API_SECRET"
                                .to_string(),
                        );
                    }
                    return Ok(signer::canonicalize(&self.params));
                };
                let mut params = self.params.clone();
                params.insert("requested_at".to_string(), Utc::now().timestamp().to_string());
                params.insert("api_key".to_string(), api_key.to_string());

                // Compatibility contract: sign the encoded body when one is
                // present, the stripped query text otherwise.
                let material = if self.body_is_empty() {
                    signer::canonicalize_stripped(&params)
                } else {
                    self.body_text().to_string()
                };
                let signature = self.config.signature_scheme.sign(&material, secret);
                Ok(format!("{}&signature={}", signer::canonicalize(&params), signature))
            }
        }
    }

    pub fn url(&self) -> Result<String> {
        let base = format!(
            "{}/{}",
            self.config.host.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        );
        let query = self.query_string()?;
        if query.is_empty() {
            Ok(base)
        } else {
            Ok(format!("{}?{}", base, query))
        }
    }

    pub async fn get(&self) -> Result<Response> {
        self.send(Method::GET).await
    }

    pub async fn post(&self) -> Result<Response> {
        self.send(Method::POST).await
    }

    pub async fn put(&self) -> Result<Response> {
        self.send(Method::PUT).await
    }

    pub async fn delete(&self) -> Result<Response> {
        self.send(Method::DELETE).await
    }

    async fn send(&self, method: Method) -> Result<Response> {
        let url = self.url()?;
        if self.config.verbose {
            info!("{} {}", method, url);
        } else {
            debug!("{} {}", method, url);
        }

        let mut request = http_client()
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if matches!(method, Method::POST | Method::PUT) && !self.body_is_empty() {
            request = request.body(self.body_text().to_string());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(String::from);
                let body = response.text().await.unwrap_or_default();
                if status.is_success() {
                    Ok(Response::new(
                        status.as_u16(),
                        content_type,
                        body,
                        self.config.verbose,
                    ))
                } else {
                    Ok(Response::failed(
                        status.as_u16(),
                        content_type,
                        body,
                        status.to_string(),
                        self.config.verbose,
                    ))
                }
            }
            Err(err) => Ok(Response::failed(
                0,
                None,
                String::new(),
                format!("Request failed: {}", err),
                self.config.verbose,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::signer::SignatureScheme;
    use serde_json::json;

    fn config_with_credentials() -> Config {
        Config {
            api_key: Some("demo-key".to_string()),
            api_secret: Some("sekrit".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn unsigned_query_string_is_sorted_and_escaped() {
        let config = Config::default();
        let request = ApiRequest::new(&config, "/search.json")
            .param("query", "weather data")
            .param("model", "dataset");
        assert_eq!(
            request.query_string().unwrap(),
            "model=dataset&query=weather+data"
        );
    }

    #[test]
    fn url_has_no_question_mark_without_params() {
        let config = Config::default();
        let request = ApiRequest::new(&config, "/datasets.json");
        assert_eq!(
            request.url().unwrap(),
            format!("{}/datasets.json", config.host)
        );
    }

    #[test]
    fn required_auth_without_credentials_is_an_error() {
        let config = Config::default();
        let request = ApiRequest::new(&config, "/datasets.json").auth(AuthMode::Required);
        match request.query_string() {
            Err(DatacatError::Authentication(_)) => {}
            other => panic!("expected authentication error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn if_possible_without_credentials_proceeds_unsigned() {
        let config = Config::default();
        let request = ApiRequest::new(&config, "/datasets.json")
            .param("id", "monkeys")
            .auth(AuthMode::IfPossible);
        assert_eq!(request.query_string().unwrap(), "id=monkeys");
    }

    #[test]
    fn signed_query_string_appends_signature_after_injected_params() {
        let config = config_with_credentials();
        let request = ApiRequest::new(&config, "/datasets.json")
            .param("id", "monkeys")
            .auth(AuthMode::Required);
        let query = request.query_string().unwrap();
        assert!(query.contains("api_key=demo-key"));
        assert!(query.contains("requested_at="));
        let (unsigned, signature) = query.rsplit_once("&signature=").unwrap();
        assert_eq!(signature.len(), 32);
        assert!(unsigned.starts_with("api_key=demo-key&id=monkeys&requested_at="));
    }

    #[test]
    fn body_bytes_are_the_signing_material_when_a_body_is_present() {
        let config = config_with_credentials();
        let body = json!({"package": {"fmt": "csv"}});
        let request = ApiRequest::new(&config, "/datasets/1/packages.json")
            .body(body.clone())
            .auth(AuthMode::Required);
        let query = request.query_string().unwrap();
        let (_, signature) = query.rsplit_once("&signature=").unwrap();
        let expected = SignatureScheme::LegacyDigest
            .sign(&serde_json::to_string(&body).unwrap(), "sekrit");
        assert_eq!(signature, expected);
    }

    #[test]
    fn empty_body_falls_back_to_stripped_query_material() {
        let config = config_with_credentials();
        let request = ApiRequest::new(&config, "/datasets.json")
            .body(json!({}))
            .auth(AuthMode::Required);
        let query = request.query_string().unwrap();
        let (unsigned, signature) = query.rsplit_once("&signature=").unwrap();
        // Recompute the stripped material from the transmitted params
        let mut params = BTreeMap::new();
        for pair in unsigned.split('&') {
            let (key, value) = pair.split_once('=').unwrap();
            params.insert(key.to_string(), value.replace('+', " "));
        }
        let expected = SignatureScheme::LegacyDigest
            .sign(&signer::canonicalize_stripped(&params), "sekrit");
        assert_eq!(signature, expected);
    }

    #[test]
    fn raw_query_bypasses_escaping_and_signing() {
        let config = config_with_credentials();
        let request = ApiRequest::new(&config, "/search.json")
            .raw_query("foo=bar")
            .auth(AuthMode::Required);
        assert_eq!(request.query_string().unwrap(), "foo=bar");
    }

    #[test]
    fn query_string_is_memoized_per_instance() {
        let config = config_with_credentials();
        let request = ApiRequest::new(&config, "/datasets.json")
            .param("id", "monkeys")
            .auth(AuthMode::Required);
        // requested_at would drift between calls if it were recomputed
        assert_eq!(request.query_string().unwrap(), request.query_string().unwrap());
    }
}
