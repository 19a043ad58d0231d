//! # jimeng-client
//!
//! Client library for the Jimeng (Volcengine) asynchronous image
//! generation API.
//!
//! The API runs every generation as a task: a signed submit call returns
//! a `task_id`, and the client polls a signed query call until the task
//! reaches a terminal status. This crate provides:
//! - The HMAC-SHA256 request signer the endpoint verifies ([`auth`])
//! - A dispatching client with typed errors ([`JimengClient`])
//! - Fixed-interval polling with a caller-supplied deadline
//! - A single-flight gate serializing generation operations ([`gate`])
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use jimeng_client::JimengClient;
//! use jimeng_common::{Config, GenerationRequest};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("my-access-key", "my-secret-key");
//! let client = JimengClient::new(config)?;
//!
//! let request = GenerationRequest::text_to_image("a lighthouse at dusk")
//!     .with_size(1024, 1024);
//!
//! let result = client
//!     .generate(
//!         &request,
//!         Duration::from_secs(3),
//!         Duration::from_secs(120),
//!     )
//!     .await?;
//! println!("images: {:?}", result.image_urls);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use tokio::time::Instant;

use jimeng_common::{Config, GenerationRequest, QueryResult, SubmitResult, TaskQuery};

pub mod auth;
pub mod client;
pub mod error;
pub mod gate;

pub use auth::{RequestSigner, SignedRequest};
pub use client::JimengClient;
pub use error::ClientError;
pub use gate::ConcurrencyGate;

/// Trait for generation client implementations.
///
/// Provides the submit/query seam plus the poll lifecycle built on top of
/// it. Implementations must support async operations and be thread-safe
/// (Send + Sync).
#[must_use = "GenerationClient must be used to make requests"]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Get the client's configuration.
    fn config(&self) -> &Config;

    /// Submit a generation task.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails validation, the transport
    /// fails, the API answers with a non-2xx status, or the response
    /// envelope carries no task id.
    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResult>;

    /// Query the status and results of a previously submitted task.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails, the API answers with a
    /// non-2xx status, or the response envelope carries no payload.
    async fn query(&self, query: &TaskQuery) -> Result<QueryResult>;

    /// Validate a generation request before sending.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidRequest`] if validation fails.
    fn validate_request(&self, request: &GenerationRequest) -> Result<()> {
        request
            .validate()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        Ok(())
    }

    /// Poll a task on a fixed interval until it completes or a deadline
    /// is reached.
    ///
    /// Returns the query result the first time the status is `done`; no
    /// further query is issued afterwards. A terminal `not_found` or
    /// `expired` status fails immediately, without sleeping first. The
    /// interval is constant by design; the sleep between polls is a
    /// cooperative suspension point, not a blocked thread.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TaskFailed`] on a terminal status other
    /// than `done`, [`ClientError::TaskTimeout`] once `max_wait` elapses
    /// without one, and any query error as-is.
    async fn wait_for_completion(
        &self,
        task_id: &str,
        req_key: &str,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<QueryResult> {
        let started = Instant::now();
        loop {
            let waited = started.elapsed();
            if waited >= max_wait {
                warn!("task {task_id} still pending after {waited:?}, giving up");
                return Err(ClientError::TaskTimeout {
                    task_id: task_id.to_string(),
                    waited,
                }
                .into());
            }

            let result = self.query(&TaskQuery::new(req_key, task_id)).await?;
            match result.status {
                jimeng_common::GenerationStatus::Done => {
                    debug!("task {task_id} done after {:?}", started.elapsed());
                    return Ok(result);
                }
                status if status.is_terminal() => {
                    warn!("task {task_id} ended with status `{status}`");
                    return Err(ClientError::TaskFailed { status }.into());
                }
                status => {
                    debug!("task {task_id} is `{status}`, polling again in {poll_interval:?}");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    /// Submit a task, then poll it to completion.
    ///
    /// The query variant is signed under the same `req_key` the request
    /// was submitted with.
    ///
    /// # Errors
    ///
    /// Propagates submit errors and every
    /// [`Self::wait_for_completion`] failure mode.
    async fn submit_and_wait(
        &self,
        request: &GenerationRequest,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Result<QueryResult> {
        let submitted = self.submit(request).await?;
        debug!("task {} submitted, entering poll loop", submitted.task_id);
        self.wait_for_completion(&submitted.task_id, &request.req_key, poll_interval, max_wait)
            .await
    }
}
