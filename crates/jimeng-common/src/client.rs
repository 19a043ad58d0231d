//! Client configuration types.
//!
//! Provides [`Config`] for the Jimeng API client along with the
//! [`GatePolicy`] selector controlling single-flight behavior.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Default region for the visual generation service.
pub const DEFAULT_REGION: &str = "cn-north-1";

/// Default service identifier used in the credential scope.
pub const DEFAULT_SERVICE: &str = "cv";

/// Default HTTPS endpoint for the visual generation API.
pub const DEFAULT_ENDPOINT: &str = "https://visual.volcengineapi.com";

/// Policy applied when a generation operation is requested while another
/// one is already in flight.
///
/// The API tolerates only one generation-related call at a time per client
/// process; this selects what happens to the second caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    /// Fail the second operation immediately with a busy error.
    #[default]
    Reject,
    /// Park the second operation and run it after the first completes,
    /// in FIFO order.
    Queue,
}

/// Configuration for a Jimeng API client.
///
/// Credentials are immutable for the lifetime of a client instance. The
/// secret key is stored as a [`SecretString`] so it is redacted from debug
/// output and never serialized.
///
/// # Examples
///
/// ```
/// use jimeng_common::{Config, GatePolicy};
///
/// let config = Config::new("my-access-key", "my-secret-key")
///     .with_region("cn-north-1")
///     .with_timeout(30)
///     .with_gate_policy(GatePolicy::Queue);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Access key identifier used in the Authorization credential scope.
    pub access_key_id: String,
    /// Secret key used to derive per-request signing keys.
    ///
    /// Will not be serialized to prevent accidental exposure.
    #[serde(skip_serializing, default)]
    pub secret_key: Option<SecretString>,
    /// Region component of the credential scope.
    pub region: String,
    /// Service component of the credential scope.
    pub service: String,
    /// Base HTTPS endpoint requests are sent to.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
    /// Single-flight policy for generation operations.
    #[serde(default)]
    pub gate_policy: GatePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_key: None,
            region: DEFAULT_REGION.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_seconds: Some(30),
            gate_policy: GatePolicy::default(),
        }
    }
}

impl Config {
    /// Creates a new configuration with the given credentials and the
    /// default region, service, and endpoint.
    ///
    /// # Examples
    ///
    /// ```
    /// use jimeng_common::Config;
    ///
    /// let config = Config::new("my-access-key", "my-secret-key");
    /// assert_eq!(config.region, "cn-north-1");
    /// ```
    pub fn new(access_key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_key: Some(SecretString::new(secret_key.into().into())),
            ..Default::default()
        }
    }

    /// Sets the region used in the credential scope.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sets the service used in the credential scope.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Sets a custom base endpoint.
    ///
    /// Override this for test servers or regional deployments.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the request timeout.
    ///
    /// # Arguments
    ///
    /// * `timeout_seconds` - Timeout in seconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets the single-flight gate policy.
    #[must_use]
    pub const fn with_gate_policy(mut self, policy: GatePolicy) -> Self {
        self.gate_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new("ak", "sk");
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.service, DEFAULT_SERVICE);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.gate_policy, GatePolicy::Reject);
        assert!(config.secret_key.is_some());
    }

    #[test]
    fn test_config_builders() {
        let config = Config::new("ak", "sk")
            .with_region("us-east-1")
            .with_service("cv2")
            .with_endpoint("https://example.com")
            .with_timeout(5)
            .with_gate_policy(GatePolicy::Queue);

        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.service, "cv2");
        assert_eq!(config.endpoint, "https://example.com");
        assert_eq!(config.timeout_seconds, Some(5));
        assert_eq!(config.gate_policy, GatePolicy::Queue);
    }

    #[test]
    fn test_secret_key_not_serialized() {
        let config = Config::new("ak", "super-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(json.contains("ak"));
    }

    #[test]
    fn test_secret_key_redacted_in_debug() {
        let config = Config::new("ak", "super-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
    }
}
