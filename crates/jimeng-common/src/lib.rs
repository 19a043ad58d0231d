//! # jimeng-common
//!
//! Common types and data structures for the Jimeng (Volcengine) image
//! generation API.
//!
//! This crate provides the foundational types for building clients against
//! the asynchronous task-based generation endpoint:
//! - Client configuration with secure credential storage
//! - Submit and query request bodies, plus the shared response envelope
//! - Task status tracking across the poll lifecycle
//!
//! ## Example
//!
//! ```
//! use jimeng_common::{Config, GenerationRequest, GenerationStatus};
//!
//! // Configure a client against the default endpoint
//! let config = Config::new("my-access-key", "my-secret-key");
//!
//! // Build a text-to-image submission
//! let request = GenerationRequest::text_to_image("a lighthouse at dusk")
//!     .with_size(1024, 1024)
//!     .with_seed(42);
//!
//! assert!(request.validate().is_ok());
//! assert!(!GenerationStatus::InQueue.is_terminal());
//! ```

/// Client configuration and concurrency policy types.
///
/// Contains the credentials/endpoint configuration consumed by the client
/// and the single-flight gate policy selector.
pub mod client;
/// Generation task types: request bodies, response envelope, task status.
///
/// Provides the wire types for submitting generation jobs and polling
/// their status, along with parameter validation helpers.
pub mod generation;

pub use client::{Config, GatePolicy, DEFAULT_ENDPOINT, DEFAULT_REGION, DEFAULT_SERVICE};
pub use generation::{
    ApiResponse, GenerationRequest, GenerationStatus, LogoInfo, QueryOptions, QueryResult,
    SubmitResult, TaskQuery, ACTION_QUERY, ACTION_SUBMIT, API_VERSION, REQ_KEY_I2I, REQ_KEY_T2I,
};
