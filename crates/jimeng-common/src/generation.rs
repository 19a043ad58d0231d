//! Generation task types for the Jimeng asynchronous task API.
//!
//! The API runs every generation as a two-step task: a submit call returns
//! a remote-assigned `task_id`, and repeated query calls report its status
//! until a terminal state. This module provides the request bodies for both
//! calls, the shared response envelope, and the task status enum.
//!
//! Request bodies are serialized with struct field order preserved and
//! `None` fields omitted; the serialized form is hashed and signed, so it
//! must be produced exactly once and reused byte-for-byte.

use serde::{Deserialize, Serialize};

/// Service identifier for text-to-image generation.
pub const REQ_KEY_T2I: &str = "jimeng_t2i_v30";

/// Service identifier for image-to-image generation (3.0 smart reference).
pub const REQ_KEY_I2I: &str = "jimeng_i2i_v30";

/// Query-string action for submitting a generation task.
pub const ACTION_SUBMIT: &str = "CVSync2AsyncSubmitTask";

/// Query-string action for querying a task result.
pub const ACTION_QUERY: &str = "CVSync2AsyncGetResult";

/// API version sent as the `Version` query parameter.
pub const API_VERSION: &str = "2022-08-31";

/// Maximum prompt length accepted by the service, in characters.
pub const MAX_PROMPT_CHARS: usize = 800;

/// Recommended 1K output sizes for text-to-image, as `(ratio, width, height)`.
pub const STANDARD_1K_SIZES: &[(&str, u32, u32)] = &[
    ("1:1", 1328, 1328),
    ("4:3", 1472, 1104),
    ("3:2", 1584, 1056),
    ("16:9", 1664, 936),
    ("21:9", 2016, 864),
];

/// Recommended 2K output sizes for text-to-image, as `(ratio, width, height)`.
pub const HD_2K_SIZES: &[(&str, u32, u32)] = &[
    ("1:1", 2048, 2048),
    ("4:3", 2304, 1728),
    ("3:2", 2496, 1664),
    ("16:9", 2560, 1440),
    ("21:9", 3024, 1296),
];

/// Status of a generation task as reported by the query endpoint.
///
/// `Done`, `NotFound`, and `Expired` are terminal; once one of them is
/// observed no further polling is useful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Task accepted, waiting for a worker.
    InQueue,
    /// Task is being processed.
    Generating,
    /// Task finished; results are available.
    Done,
    /// The task id is unknown to the server.
    NotFound,
    /// The task result has been discarded server-side.
    Expired,
}

impl GenerationStatus {
    /// Whether this status ends the poll lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::NotFound | Self::Expired)
    }

    /// The wire representation of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InQueue => "in_queue",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a task submission call.
///
/// Covers both generation variants; `req_key` selects which one the
/// server runs. Optional fields are omitted from the serialized body so
/// the signed payload carries only what the caller set.
///
/// # Examples
///
/// ```
/// use jimeng_common::GenerationRequest;
///
/// let request = GenerationRequest::text_to_image("a red bicycle")
///     .with_size(1024, 1024)
///     .with_seed(42);
/// assert!(request.validate().is_ok());
///
/// let i2i = GenerationRequest::image_to_image("make it blue")
///     .with_image_urls(vec!["https://example.com/in.png".to_string()])
///     .with_scale(0.6);
/// assert!(i2i.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Service identifier ([`REQ_KEY_T2I`] or [`REQ_KEY_I2I`]).
    pub req_key: String,
    /// Text prompt describing the desired image.
    pub prompt: String,
    /// Whether to run the prompt through the pre-processing LLM first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_pre_llm: Option<bool>,
    /// Random seed; `-1` lets the server pick one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Edit strength for image-to-image, in `0.0..=1.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    /// Output width in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Output height in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Remote reference images for image-to-image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    /// Base64-encoded reference images for image-to-image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_data_base64: Option<Vec<String>>,
}

impl GenerationRequest {
    /// Creates a text-to-image submission for the given prompt.
    pub fn text_to_image(prompt: impl Into<String>) -> Self {
        Self {
            req_key: REQ_KEY_T2I.to_string(),
            prompt: prompt.into(),
            use_pre_llm: None,
            seed: None,
            scale: None,
            width: None,
            height: None,
            image_urls: None,
            binary_data_base64: None,
        }
    }

    /// Creates an image-to-image submission for the given prompt.
    ///
    /// A reference image must be attached via [`Self::with_image_urls`] or
    /// [`Self::with_binary_data`] before the request passes validation.
    pub fn image_to_image(prompt: impl Into<String>) -> Self {
        Self {
            req_key: REQ_KEY_I2I.to_string(),
            ..Self::text_to_image(prompt)
        }
    }

    /// Whether this request targets the image-to-image variant.
    #[must_use]
    pub fn is_image_to_image(&self) -> bool {
        self.req_key == REQ_KEY_I2I
    }

    /// Sets the output size.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the image-to-image edit strength (`0.0..=1.0`).
    #[must_use]
    pub const fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Enables or disables prompt pre-processing.
    #[must_use]
    pub const fn with_use_pre_llm(mut self, use_pre_llm: bool) -> Self {
        self.use_pre_llm = Some(use_pre_llm);
        self
    }

    /// Attaches remote reference image URLs.
    #[must_use]
    pub fn with_image_urls(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = Some(image_urls);
        self
    }

    /// Attaches base64-encoded reference images.
    #[must_use]
    pub fn with_binary_data(mut self, binary_data_base64: Vec<String>) -> Self {
        self.binary_data_base64 = Some(binary_data_base64);
        self
    }

    /// Validates this request before submission.
    ///
    /// Checks the prompt length and output dimensions for both variants;
    /// image-to-image requests additionally need a non-empty image input
    /// and an in-range edit strength.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_valid_prompt(&self.prompt) {
            anyhow::bail!(
                "prompt must be non-empty and at most {MAX_PROMPT_CHARS} characters, got {}",
                self.prompt.chars().count()
            );
        }

        if self.is_image_to_image() {
            let has_urls = self.image_urls.as_ref().is_some_and(|u| !u.is_empty());
            let has_binary = self
                .binary_data_base64
                .as_ref()
                .is_some_and(|b| !b.is_empty());
            if !has_urls && !has_binary {
                anyhow::bail!(
                    "image-to-image requires a non-empty image_urls or binary_data_base64 input"
                );
            }

            if let Some(scale) = self.scale
                && !(0.0..=1.0).contains(&scale)
            {
                anyhow::bail!("scale must be between 0.0 and 1.0, got {scale}");
            }

            if let (Some(width), Some(height)) = (self.width, self.height)
                && !is_valid_image_to_image_size(width, height)
            {
                anyhow::bail!(
                    "image-to-image size must be 512..=2016 per side with aspect ratio \
                     between 1:3 and 3:1, got {width}x{height}"
                );
            }
        } else if let (Some(width), Some(height)) = (self.width, self.height)
            && !is_valid_text_to_image_size(width, height)
        {
            anyhow::bail!(
                "text-to-image size must be 512..=2048 per side with aspect ratio \
                 between 1:3 and 3:1, got {width}x{height}"
            );
        }

        Ok(())
    }
}

/// Whether a prompt is non-empty and within the service's length limit.
#[must_use]
pub fn is_valid_prompt(prompt: &str) -> bool {
    let chars = prompt.chars().count();
    chars > 0 && chars <= MAX_PROMPT_CHARS
}

/// Whether a text-to-image output size is within the accepted range.
///
/// Sides must be in `512..=2048` and the aspect ratio within `[1:3, 3:1]`.
#[must_use]
pub fn is_valid_text_to_image_size(width: u32, height: u32) -> bool {
    in_range(width, height, 2048)
}

/// Whether an image-to-image output size is within the accepted range.
///
/// Sides must be in `512..=2016` and the aspect ratio within `[1:3, 3:1]`.
#[must_use]
pub fn is_valid_image_to_image_size(width: u32, height: u32) -> bool {
    in_range(width, height, 2016)
}

fn in_range(width: u32, height: u32, max_side: u32) -> bool {
    if width < 512 || width > max_side || height < 512 || height > max_side {
        return false;
    }
    let ratio = f64::from(width) / f64::from(height);
    (1.0 / 3.0..=3.0).contains(&ratio)
}

/// Watermark placement options for [`LogoInfo::position`].
pub mod watermark_position {
    /// Bottom-right corner.
    pub const BOTTOM_RIGHT: u32 = 0;
    /// Bottom-left corner.
    pub const BOTTOM_LEFT: u32 = 1;
    /// Top-left corner.
    pub const TOP_LEFT: u32 = 2;
    /// Top-right corner.
    pub const TOP_RIGHT: u32 = 3;
}

/// Watermark language options for [`LogoInfo::language`].
pub mod watermark_language {
    /// Chinese watermark text.
    pub const CHINESE: u32 = 0;
    /// English watermark text.
    pub const ENGLISH: u32 = 1;
}

/// Watermark configuration attached to a query via [`QueryOptions`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoInfo {
    /// Corner placement, one of the [`watermark_position`] values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Watermark language, one of the [`watermark_language`] values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<u32>,
}

/// Options controlling how a task's results are returned.
///
/// The wire format carries these as a JSON string nested inside the query
/// body's `req_json` field, not as a plain object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Request result URLs in addition to inline base64 data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<bool>,
    /// Watermark configuration for returned images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_info: Option<LogoInfo>,
}

impl QueryOptions {
    /// Encodes these options as the nested `req_json` string.
    ///
    /// Returns `None` when no option is set, so an empty `req_json` is
    /// never sent.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON encoding fails.
    pub fn to_req_json(&self) -> Result<Option<String>, serde_json::Error> {
        if self.return_url.is_none() && self.logo_info.is_none() {
            return Ok(None);
        }
        serde_json::to_string(self).map(Some)
    }
}

/// Body of a task query call.
///
/// The presence of `task_id` is what distinguishes a query body from a
/// submit body on the shared endpoint path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskQuery {
    /// Service identifier the task was submitted under.
    pub req_key: String,
    /// Remote-assigned task identifier.
    pub task_id: String,
    /// JSON-encoded [`QueryOptions`], if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_json: Option<String>,
}

impl TaskQuery {
    /// Creates a query for the given task under the given service key.
    pub fn new(req_key: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            req_key: req_key.into(),
            task_id: task_id.into(),
            req_json: None,
        }
    }

    /// Attaches result options, encoded into the `req_json` field.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot be JSON-encoded.
    pub fn with_options(mut self, options: &QueryOptions) -> Result<Self, serde_json::Error> {
        self.req_json = options.to_req_json()?;
        Ok(self)
    }
}

/// Response envelope shared by the submit and query endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Service status code; `10000` is success.
    #[serde(default)]
    pub code: i64,
    /// Human-readable status message.
    #[serde(default)]
    pub message: String,
    /// Server-assigned request identifier, useful for support tickets.
    #[serde(default)]
    pub request_id: String,
    /// HTTP-like status mirror of `code`.
    #[serde(default)]
    pub status: i64,
    /// Server-side processing time.
    #[serde(default)]
    pub time_elapsed: String,
    /// Operation-specific payload; absent on errors.
    pub data: Option<T>,
}

/// Payload of a successful submit call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResult {
    /// Remote-assigned identifier for the new task.
    pub task_id: String,
}

/// Payload of a query call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Current task status.
    pub status: GenerationStatus,
    /// Result image URLs, present once the task is done and URLs were
    /// requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    /// Inline base64 result images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_data_base64: Option<Vec<String>>,
}
