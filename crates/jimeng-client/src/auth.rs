//! Request signing for the Volcengine visual API.
//!
//! Implements the HMAC-SHA256 request-signing scheme the endpoint
//! verifies: a canonical serialization of the request is hashed, bound to
//! a `date/region/service/request` credential scope, and signed with a
//! key derived from the secret through a four-stage HMAC chain. The
//! output must match the remote verifier byte-for-byte, so every
//! serialization step here is deliberate.
//!
//! Signing is a pure function of the credentials, the request, and the
//! supplied timestamp; the signer holds no mutable state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use jimeng_common::Config;

use crate::error::ClientError;

const ALGORITHM: &str = "HMAC-SHA256";
const KEY_TYPE_IDENTIFIER: &str = "request";
const SIGNED_HEADERS: &str = "content-type;host;x-content-sha256;x-date";
const CONTENT_TYPE: &str = "application/json";

/// A fully signed request, ready for dispatch.
///
/// Holds the absolute URL (including the sorted query string) and the
/// five headers the signature covers.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    /// Absolute request URL with the canonical query string attached.
    pub url: String,
    /// Header name/value pairs to attach verbatim.
    pub headers: Vec<(&'static str, String)>,
}

/// Signer for API requests.
///
/// Owns the immutable credentials for the lifetime of a client instance.
/// The secret key stays wrapped in a [`SecretString`] and is only exposed
/// for the first stage of the key derivation.
#[derive(Clone)]
pub struct RequestSigner {
    access_key_id: String,
    secret_key: SecretString,
    region: String,
    service: String,
    host: String,
    endpoint: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"[REDACTED]")
            .field("region", &self.region)
            .field("service", &self.service)
            .field("host", &self.host)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl RequestSigner {
    /// Builds a signer from a client configuration.
    ///
    /// The `Host` header is derived from the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Signing`] when the access key or secret key
    /// is missing or empty, or when the endpoint has no parseable host.
    /// An empty secret would otherwise silently sign over an empty key.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        if config.access_key_id.is_empty() {
            return Err(ClientError::Signing("access key id is empty".to_string()));
        }
        let secret_key = config
            .secret_key
            .clone()
            .filter(|s| !s.expose_secret().is_empty())
            .ok_or_else(|| ClientError::Signing("secret key is missing or empty".to_string()))?;

        let host = url::Url::parse(&config.endpoint)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .ok_or_else(|| {
                ClientError::Signing(format!(
                    "cannot extract host from endpoint: {}",
                    config.endpoint
                ))
            })?;

        Ok(Self {
            access_key_id: config.access_key_id.clone(),
            secret_key,
            region: config.region.clone(),
            service: config.service.clone(),
            host,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Signs a request at the given timestamp.
    ///
    /// `query` is merged with the fixed `Action` and `Version` parameters
    /// and rendered in byte-sorted order. `body` must be the exact bytes
    /// that will be sent; its SHA-256 digest is embedded in the signed
    /// headers and as the canonical payload hash.
    ///
    /// Identical inputs always produce an identical [`SignedRequest`].
    #[must_use]
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        body: &str,
        action: &str,
        version: &str,
        timestamp: DateTime<Utc>,
    ) -> SignedRequest {
        let datetime = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = timestamp.format("%Y%m%d").to_string();

        let query_string = canonical_query(query, action, version);
        let payload_hash = sha256_hex(body.as_bytes());

        let canonical_request = canonical_request(
            method,
            path,
            &query_string,
            &self.host,
            &payload_hash,
            &datetime,
        );

        let scope = format!(
            "{date_stamp}/{}/{}/{KEY_TYPE_IDENTIFIER}",
            self.region, self.service
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{datetime}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let signing_key = self.derive_signing_key(&date_stamp);
        let signature = hex::encode(hmac_sign(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, \
             Signature={signature}",
            self.access_key_id
        );

        let url = if query_string.is_empty() {
            format!("{}{path}", self.endpoint)
        } else {
            format!("{}{path}?{query_string}", self.endpoint)
        };

        SignedRequest {
            url,
            headers: vec![
                ("Content-Type", CONTENT_TYPE.to_string()),
                ("Host", self.host.clone()),
                ("X-Date", datetime),
                ("X-Content-Sha256", payload_hash),
                ("Authorization", authorization),
            ],
        }
    }

    /// Derives the per-request signing key.
    ///
    /// Four chained HMAC stages over date, region, service, and the fixed
    /// key-type terminator; each stage keys the next with its raw output
    /// bytes. Recomputed per request rather than cached per calendar day.
    fn derive_signing_key(&self, date_stamp: &str) -> Vec<u8> {
        let k_date = hmac_sign(
            self.secret_key.expose_secret().as_bytes(),
            date_stamp.as_bytes(),
        );
        let k_region = hmac_sign(&k_date, self.region.as_bytes());
        let k_service = hmac_sign(&k_region, self.service.as_bytes());
        hmac_sign(&k_service, KEY_TYPE_IDENTIFIER.as_bytes())
    }
}

/// Renders the canonical query string.
///
/// Caller parameters are merged with the fixed `Action` and `Version`
/// parameters, sorted by raw parameter name in byte order, and joined as
/// `k=v&...`. Values pass through without URL-encoding to match the
/// remote verifier's reference behavior; values containing `&` or `=`
/// would produce an ambiguous string.
fn canonical_query(query: &[(&str, &str)], action: &str, version: &str) -> String {
    let mut params: BTreeMap<&str, &str> = query.iter().copied().collect();
    params.insert("Action", action);
    params.insert("Version", version);

    let mut out = String::new();
    for (i, (key, value)) in params.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out
}

/// Builds the canonical request string the signature covers.
///
/// Line structure: method, path, sorted query, the four canonical
/// headers (each newline-terminated), a blank separator, the signed
/// header names, and the payload hash.
fn canonical_request(
    method: &str,
    path: &str,
    query_string: &str,
    host: &str,
    payload_hash: &str,
    datetime: &str,
) -> String {
    let canonical_headers = format!(
        "content-type:{CONTENT_TYPE}\nhost:{host}\nx-content-sha256:{payload_hash}\nx-date:{datetime}\n"
    );
    format!("{method}\n{path}\n{query_string}\n{canonical_headers}\n{SIGNED_HEADERS}\n{payload_hash}")
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sign(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC-SHA256 accepts keys of any length, so construction cannot fail.
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).unwrap_or_else(|_| unreachable!());
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
