//! Layered client configuration.
//!
//! Values are resolved in increasing priority: built-in defaults, the
//! site-wide file (`/etc/datacat.toml`), the user identity file, an explicit
//! `--config` path, then `DATACAT_*` environment variables. The resulting
//! `Config` is immutable and passed by reference into every request and
//! workflow constructor.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::api::signer::SignatureScheme;
use crate::error::{ConfigError, Result};

const SITE_CONFIG_PATH: &str = "/etc/datacat.toml";

fn default_timestamp_format() -> String {
    "%Y-%m-%d_%H-%M-%S".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Catalog API host
    pub host: String,

    /// Site host serving companion resources (README, dataset descriptors)
    pub site_host: String,

    /// API key identifying the caller
    pub api_key: Option<String>,

    /// Shared secret used to sign requests
    pub api_secret: Option<String>,

    /// Site username
    pub username: Option<String>,

    /// strftime format used when synthesizing archive names
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Signature scheme the server expects
    #[serde(default)]
    pub signature_scheme: SignatureScheme,

    /// Verbose mode, set from the command line after loading
    #[serde(skip)]
    pub verbose: bool,
}

/// Partial configuration read from one layer; `None` fields leave the
/// previous layer's value in place.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    host: Option<String>,
    site_host: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    username: Option<String>,
    timestamp_format: Option<String>,
    signature_scheme: Option<SignatureScheme>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "https://api.datacat.org".to_string(),
            site_host: "https://datacat.org".to_string(),
            api_key: None,
            api_secret: None,
            username: None,
            timestamp_format: default_timestamp_format(),
            signature_scheme: SignatureScheme::default(),
            verbose: false,
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Honor a .env file if one exists (development convenience)
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        config.apply_file(Path::new(SITE_CONFIG_PATH), false)?;

        if let Some(path) = config_path {
            config.apply_file(Path::new(path), true)?;
        } else if let Some(user_file) = Self::user_config_path() {
            config.apply_file(&user_file, false)?;
        }

        config.apply_env();
        Ok(config)
    }

    /// Merge one TOML layer into the current values. A missing file is an
    /// error only when the caller named it explicitly.
    fn apply_file(&mut self, path: &Path, required: bool) -> Result<()> {
        if !path.exists() {
            if required {
                return Err(ConfigError::FileNotFound { path: path.to_path_buf() }.into());
            }
            return Ok(());
        }
        let content = fs::read_to_string(path)?;
        let overlay: ConfigOverlay = toml::from_str(&content)?;
        self.apply_overlay(overlay);
        Ok(())
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(host) = overlay.host {
            self.host = host;
        }
        if let Some(site_host) = overlay.site_host {
            self.site_host = site_host;
        }
        if let Some(api_key) = overlay.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(api_secret) = overlay.api_secret {
            self.api_secret = Some(api_secret);
        }
        if let Some(username) = overlay.username {
            self.username = Some(username);
        }
        if let Some(timestamp_format) = overlay.timestamp_format {
            self.timestamp_format = timestamp_format;
        }
        if let Some(scheme) = overlay.signature_scheme {
            self.signature_scheme = scheme;
        }
    }

    /// Environment variables win over every file layer.
    fn apply_env(&mut self) {
        if let Ok(host) = env::var("DATACAT_HOST") {
            self.host = host;
        }
        if let Ok(site_host) = env::var("DATACAT_SITE_HOST") {
            self.site_host = site_host;
        }
        if let Ok(api_key) = env::var("DATACAT_API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Ok(api_secret) = env::var("DATACAT_API_SECRET") {
            self.api_secret = Some(api_secret);
        }
        if let Ok(username) = env::var("DATACAT_USERNAME") {
            self.username = Some(username);
        }
        if let Ok(format) = env::var("DATACAT_TIMESTAMP_FORMAT") {
            self.timestamp_format = format;
        }
        if let Ok(scheme) = env::var("DATACAT_SIGNATURE_SCHEME") {
            match scheme.as_str() {
                "legacy-digest" => self.signature_scheme = SignatureScheme::LegacyDigest,
                "hmac-sha256" => self.signature_scheme = SignatureScheme::HmacSha256,
                other => {
                    tracing::warn!("Ignoring unknown DATACAT_SIGNATURE_SCHEME '{}'", other);
                }
            }
        }
    }

    fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "datacat", "datacat-cli")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Both halves of the API identity, when present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some((key, secret))
            }
            _ => None,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    /// Absolute URL of a resource on the site host.
    pub fn site_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.site_host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_merges_only_present_fields() {
        let mut config = Config::default();
        let original_host = config.host.clone();
        config.apply_overlay(ConfigOverlay {
            api_key: Some("key".to_string()),
            api_secret: Some("secret".to_string()),
            ..Default::default()
        });
        assert_eq!(config.host, original_host);
        assert_eq!(config.api_key.as_deref(), Some("key"));
        assert!(config.has_credentials());
    }

    #[test]
    fn empty_credentials_do_not_count() {
        let mut config = Config::default();
        config.api_key = Some(String::new());
        config.api_secret = Some("secret".to_string());
        assert!(!config.has_credentials());
    }

    #[test]
    fn overlay_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "host = \"https://api.example.test\"\napi_key = \"k\"\napi_secret = \"s\"\nsignature_scheme = \"hmac-sha256\"\n",
        )
        .unwrap();
        let mut config = Config::default();
        config.apply_file(&path, true).unwrap();
        assert_eq!(config.host, "https://api.example.test");
        assert_eq!(config.signature_scheme, SignatureScheme::HmacSha256);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let mut config = Config::default();
        assert!(config
            .apply_file(Path::new("/nonexistent/datacat.toml"), true)
            .is_err());
        assert!(config
            .apply_file(Path::new("/nonexistent/datacat.toml"), false)
            .is_ok());
    }

    #[test]
    fn site_url_joins_cleanly() {
        let mut config = Config::default();
        config.site_host = "https://datacat.org/".to_string();
        assert_eq!(
            config.site_url("/README-datacat"),
            "https://datacat.org/README-datacat"
        );
    }
}
