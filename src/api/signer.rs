//! Canonicalization and signing of request parameters.
//!
//! The server authenticates callers without a session by checking a keyed
//! digest over either the request body (POST/PUT) or a stripped form of the
//! query string (GET/DELETE). Both canonical forms iterate the parameters in
//! ascending key order, so any permutation of the same parameters signs
//! identically.

use std::collections::BTreeMap;

use data_encoding::HEXLOWER;
use md5::{Digest, Md5};
use ring::hmac;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// How a request relates to the caller's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Send unsigned.
    #[default]
    None,
    /// Sign, failing with an authentication error when credentials are absent.
    Required,
    /// Sign when credentials are configured, otherwise proceed unsigned.
    IfPossible,
}

/// The keyed digest the server expects.
///
/// `LegacyDigest` reproduces the historical wire scheme: the MD5 of the
/// signing material concatenated with the secret. It is not a robust MAC;
/// servers that have upgraded accept `HmacSha256` instead. The two ends must
/// agree, so the scheme is explicit configuration rather than a silent
/// client-side upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureScheme {
    #[default]
    LegacyDigest,
    HmacSha256,
}

impl SignatureScheme {
    /// Produce the fixed-length hex signature over `material`.
    pub fn sign(&self, material: &str, secret: &str) -> String {
        match self {
            SignatureScheme::LegacyDigest => {
                let mut hasher = Md5::new();
                hasher.update(material.as_bytes());
                hasher.update(secret.as_bytes());
                HEXLOWER.encode(&hasher.finalize())
            }
            SignatureScheme::HmacSha256 => {
                let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
                HEXLOWER.encode(hmac::sign(&key, material.as_bytes()).as_ref())
            }
        }
    }
}

/// `application/x-www-form-urlencoded` escaping, applied before either
/// canonical form is assembled.
pub fn escape(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Sorted `escape(key)=escape(value)` pairs joined by `&`.
///
/// This exact string appears literally in the URL.
pub fn canonicalize(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", escape(key), escape(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// The same sorted iteration with no `=` or `&`.
///
/// Never transmitted; used only as the signing input for requests without a
/// body.
pub fn canonicalize_stripped(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}{}", escape(key), escape(value)))
        .collect()
}
