//! Dispatching client for the Jimeng API.
//!
//! [`JimengClient`] signs every outgoing call, POSTs it to the shared
//! endpoint path, and translates transport failures into typed errors.
//! Submit and query share one path and are told apart by the payload: a
//! body carrying `task_id` is signed under the query action, one without
//! under the submit action.
//!
//! The client performs no automatic retry. Errors carry an advisory
//! [`ClientError::is_retryable`] flag for `429`/`500`; acting on it is a
//! caller decision.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, warn};
use serde::de::DeserializeOwned;

use jimeng_common::{
    ApiResponse, Config, GenerationRequest, QueryOptions, QueryResult, SubmitResult, TaskQuery,
    ACTION_QUERY, ACTION_SUBMIT, API_VERSION,
};

use crate::auth::RequestSigner;
use crate::error::ClientError;
use crate::gate::ConcurrencyGate;
use crate::GenerationClient;

/// Client for the Jimeng asynchronous generation API.
///
/// Wraps a [`reqwest::Client`], a [`RequestSigner`] owning the immutable
/// credentials, and a [`ConcurrencyGate`] serializing generation
/// operations. Cloning is cheap and clones share the same gate, so the
/// single-flight guarantee holds across clones.
///
/// # Examples
///
/// ```no_run
/// use jimeng_client::JimengClient;
/// use jimeng_common::Config;
///
/// let config = Config::new("my-access-key", "my-secret-key");
/// let client = JimengClient::new(config)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct JimengClient {
    client: reqwest::Client,
    signer: RequestSigner,
    config: Arc<Config>,
    gate: ConcurrencyGate,
}

impl JimengClient {
    /// Create a new client from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are missing or empty, the
    /// endpoint has no parseable host, or HTTP client creation fails.
    pub fn new(config: Config) -> Result<Self> {
        let signer = RequestSigner::from_config(&config)?;

        // None means no timeout (useful for slow networks).
        let client = match config.timeout_seconds {
            Some(timeout) => reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()?,
            None => reqwest::Client::builder().build()?,
        };

        let gate = ConcurrencyGate::new(config.gate_policy);

        Ok(Self {
            client,
            signer,
            config: Arc::new(config),
            gate,
        })
    }

    /// The single-flight gate guarding generation operations.
    #[must_use]
    pub const fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Submit a task and poll it to completion, holding the gate
    /// throughout.
    ///
    /// This is the primary entry point: at most one `generate` (per gate)
    /// runs at a time, and the gate is released on every exit path.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Busy`] under the reject policy when another
    /// operation is in flight, and otherwise every
    /// [`GenerationClient::submit_and_wait`] failure mode.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<QueryResult> {
        self.gate
            .run(self.submit_and_wait(request, poll_interval, max_wait))
            .await
    }

    /// Query a task with result options attached.
    ///
    /// Queries are not gated; they are cheap status reads.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`GenerationClient::query`], plus a
    /// serialization error if the options cannot be encoded.
    pub async fn query_with_options(
        &self,
        req_key: &str,
        task_id: &str,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        let query = TaskQuery::new(req_key, task_id)
            .with_options(options)
            .map_err(ClientError::Serialization)?;
        self.query(&query).await
    }

    /// Sign and send a payload, routing on its shape.
    ///
    /// A payload carrying `task_id` is a status query; one without is a
    /// task submission. Both generation variants share this path and
    /// differ only by `req_key` inside the body.
    async fn dispatch<T: DeserializeOwned>(
        &self,
        body: String,
    ) -> Result<ApiResponse<T>, ClientError> {
        let payload: serde_json::Value = serde_json::from_str(&body)?;
        let action = if payload.get("task_id").is_some() {
            ACTION_QUERY
        } else {
            ACTION_SUBMIT
        };
        self.send_signed(action, body).await
    }

    /// Sign a payload under the given action and POST it.
    async fn send_signed<T: DeserializeOwned>(
        &self,
        action: &str,
        body: String,
    ) -> Result<ApiResponse<T>, ClientError> {
        let signed = self
            .signer
            .sign("POST", "/", &[], &body, action, API_VERSION, Utc::now());

        let mut request_builder = self.client.post(&signed.url);
        for (name, value) in &signed.headers {
            request_builder = request_builder.header(*name, value);
        }

        let response = request_builder.body(body).send().await.map_err(|e| {
            error!("request for {action} failed to complete: {e}");
            ClientError::Network(e)
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_text = response.text().await.map_err(|e| {
                warn!("failed to read error response body: {e}");
                ClientError::Network(e)
            })?;
            let http_error = ClientError::Http {
                status,
                body: body_text,
            };
            if http_error.is_retryable() {
                warn!("{action} failed with status {status}, a retry is advisable");
            } else {
                error!("{action} failed with status {status}");
            }
            return Err(http_error);
        }

        let text = response.text().await?;
        debug!("raw {action} response: {text}");
        Ok(serde_json::from_str(&text)?)
    }

    /// Unwrap the envelope payload, treating an empty one as an error.
    fn into_data<T>(response: ApiResponse<T>) -> Result<T, ClientError> {
        response.data.ok_or_else(|| {
            ClientError::InvalidResponse(format!(
                "no payload in response (code {}: {})",
                response.code, response.message
            ))
        })
    }
}

#[async_trait]
impl GenerationClient for JimengClient {
    fn config(&self) -> &Config {
        &self.config
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResult> {
        self.validate_request(request)?;
        let body = serde_json::to_string(request).map_err(ClientError::Serialization)?;
        let response = self.dispatch::<SubmitResult>(body).await?;
        Ok(Self::into_data(response)?)
    }

    async fn query(&self, query: &TaskQuery) -> Result<QueryResult> {
        let body = serde_json::to_string(query).map_err(ClientError::Serialization)?;
        let response = self.dispatch::<QueryResult>(body).await?;
        Ok(Self::into_data(response)?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use jimeng_common::{GatePolicy, GenerationStatus, REQ_KEY_T2I};
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: &str) -> Config {
        // RUST_LOG=debug surfaces the client's request/response logging.
        let _ = env_logger::builder().is_test(true).try_init();
        Config::new("test-access-key", "test-secret-key").with_endpoint(endpoint)
    }

    fn submit_envelope(task_id: &str) -> serde_json::Value {
        serde_json::json!({
            "code": 10000,
            "message": "Success",
            "request_id": "req-1",
            "status": 10000,
            "time_elapsed": "20ms",
            "data": { "task_id": task_id }
        })
    }

    fn query_envelope(status: &str, image_urls: Option<Vec<&str>>) -> serde_json::Value {
        let mut data = serde_json::json!({ "status": status });
        if let Some(urls) = image_urls {
            data["image_urls"] = serde_json::json!(urls);
        }
        serde_json::json!({
            "code": 10000,
            "message": "Success",
            "request_id": "req-2",
            "status": 10000,
            "time_elapsed": "5ms",
            "data": data
        })
    }

    #[tokio::test]
    async fn test_submit_sends_signed_headers_and_submit_action() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(query_param("Action", "CVSync2AsyncSubmitTask"))
            .and(query_param("Version", "2022-08-31"))
            .and(header("content-type", "application/json"))
            .and(header_exists("authorization"))
            .and(header_exists("x-date"))
            .and(header_exists("x-content-sha256"))
            .respond_with(ResponseTemplate::new(200).set_body_json(submit_envelope("T1")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = JimengClient::new(test_config(&mock_server.uri())).unwrap();
        let request = GenerationRequest::text_to_image("a cat").with_seed(42);

        let submitted = client.submit(&request).await.unwrap();
        assert_eq!(submitted.task_id, "T1");
    }

    #[tokio::test]
    async fn test_query_routes_to_query_action_on_task_id_presence() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(query_param("Action", "CVSync2AsyncGetResult"))
            .and(body_partial_json(serde_json::json!({ "task_id": "T1" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(query_envelope("generating", None)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = JimengClient::new(test_config(&mock_server.uri())).unwrap();
        let result = client.query(&TaskQuery::new(REQ_KEY_T2I, "T1")).await.unwrap();
        assert_eq!(result.status, GenerationStatus::Generating);
    }

    #[tokio::test]
    async fn test_http_errors_are_typed_with_advisory_retry_flag() {
        for (status, retryable) in [(429u16, true), (500, true), (403, false)] {
            let mock_server = MockServer::start().await;

            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&mock_server)
                .await;

            let client = JimengClient::new(test_config(&mock_server.uri())).unwrap();
            let error = client
                .submit(&GenerationRequest::text_to_image("a cat"))
                .await
                .unwrap_err();

            let client_error = error.downcast_ref::<ClientError>().unwrap();
            assert!(matches!(
                client_error,
                ClientError::Http { status: s, body } if *s == status && body == "nope"
            ));
            assert_eq!(client_error.is_retryable(), retryable);
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_a_network_error() {
        // Nothing listens on the discard port.
        let config = test_config("http://127.0.0.1:1").with_timeout(2);
        let client = JimengClient::new(config).unwrap();

        let error = client
            .submit(&GenerationRequest::text_to_image("a cat"))
            .await
            .unwrap_err();
        let client_error = error.downcast_ref::<ClientError>().unwrap();
        assert!(matches!(client_error, ClientError::Network(_)));
    }

    #[tokio::test]
    async fn test_missing_payload_is_an_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 50411,
                "message": "Post Img Risk Not Pass",
            })))
            .mount(&mock_server)
            .await;

        let client = JimengClient::new(test_config(&mock_server.uri())).unwrap();
        let error = client
            .submit(&GenerationRequest::text_to_image("a cat"))
            .await
            .unwrap_err();

        let client_error = error.downcast_ref::<ClientError>().unwrap();
        assert!(matches!(client_error, ClientError::InvalidResponse(_)));
        assert!(client_error.to_string().contains("50411"));
    }

    #[tokio::test]
    async fn test_generate_end_to_end_completes_after_two_queries() {
        let mock_server = MockServer::start().await;

        // Submit, then one in_queue poll, then done. Mocks are consumed
        // in mount order as each exhausts its allowance.
        Mock::given(method("POST"))
            .and(query_param("Action", "CVSync2AsyncSubmitTask"))
            .and(body_partial_json(serde_json::json!({
                "prompt": "x",
                "width": 1024,
                "height": 1024,
                "seed": 42
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(submit_envelope("T1")))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(query_param("Action", "CVSync2AsyncGetResult"))
            .and(body_partial_json(serde_json::json!({ "task_id": "T1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(query_envelope("in_queue", None)))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(query_param("Action", "CVSync2AsyncGetResult"))
            .and(body_partial_json(serde_json::json!({ "task_id": "T1" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(query_envelope("done", Some(vec!["http://x/1.png"]))),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = JimengClient::new(test_config(&mock_server.uri())).unwrap();
        let request = GenerationRequest::text_to_image("x")
            .with_size(1024, 1024)
            .with_seed(42);

        let result = client
            .generate(
                &request,
                Duration::from_millis(50),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(result.status, GenerationStatus::Done);
        assert_eq!(result.image_urls.unwrap(), vec!["http://x/1.png"]);
    }

    #[tokio::test]
    async fn test_task_failure_status_surfaces_from_generate() {
        let mock_server = MockServer::start().await;

        Mock::given(query_param("Action", "CVSync2AsyncSubmitTask"))
            .respond_with(ResponseTemplate::new(200).set_body_json(submit_envelope("T2")))
            .mount(&mock_server)
            .await;
        Mock::given(query_param("Action", "CVSync2AsyncGetResult"))
            .respond_with(ResponseTemplate::new(200).set_body_json(query_envelope("expired", None)))
            .mount(&mock_server)
            .await;

        let client = JimengClient::new(test_config(&mock_server.uri())).unwrap();
        let error = client
            .generate(
                &GenerationRequest::text_to_image("x"),
                Duration::from_millis(50),
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();

        let client_error = error.downcast_ref::<ClientError>().unwrap();
        assert!(matches!(
            client_error,
            ClientError::TaskFailed {
                status: GenerationStatus::Expired
            }
        ));
    }

    #[tokio::test]
    async fn test_reject_policy_blocks_overlapping_generate_calls() {
        let mock_server = MockServer::start().await;

        Mock::given(query_param("Action", "CVSync2AsyncSubmitTask"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(submit_envelope("T3"))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&mock_server)
            .await;
        Mock::given(query_param("Action", "CVSync2AsyncGetResult"))
            .respond_with(ResponseTemplate::new(200).set_body_json(query_envelope("done", None)))
            .mount(&mock_server)
            .await;

        let config = test_config(&mock_server.uri()).with_gate_policy(GatePolicy::Reject);
        let client = JimengClient::new(config).unwrap();
        let request = GenerationRequest::text_to_image("x");

        let background = {
            let client = client.clone();
            let request = request.clone();
            tokio::spawn(async move {
                client
                    .generate(&request, Duration::from_millis(10), Duration::from_secs(5))
                    .await
            })
        };
        // Let the first call take the gate before contending.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let error = client
            .generate(&request, Duration::from_millis(10), Duration::from_secs(5))
            .await
            .unwrap_err();
        let client_error = error.downcast_ref::<ClientError>().unwrap();
        assert!(client_error.is_busy());

        background.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_query_with_options_nests_req_json() {
        let mock_server = MockServer::start().await;

        Mock::given(query_param("Action", "CVSync2AsyncGetResult"))
            .and(body_partial_json(serde_json::json!({
                "task_id": "T4",
                "req_json": "{\"return_url\":true}"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(query_envelope("done", Some(vec!["http://x/2.png"]))),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = JimengClient::new(test_config(&mock_server.uri())).unwrap();
        let options = QueryOptions {
            return_url: Some(true),
            logo_info: None,
        };
        let result = client
            .query_with_options(REQ_KEY_T2I, "T4", &options)
            .await
            .unwrap();
        assert_eq!(result.image_urls.unwrap(), vec!["http://x/2.png"]);
    }
}
