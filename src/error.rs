//! # Error Handling
//!
//! Every failure the pipeline can hit is an [`InsightError`]. Nothing in the
//! library panics or aborts a batch on these: the batch runner turns a
//! per-poster error into a reported skip, and the CLI turns the rest into a
//! printed message.
//!
//! ## Taxonomy
//!
//! | Category | Raised by | Effect |
//! |----------|-----------|--------|
//! | `config`, `credential` | session configuration | analysis is refused |
//! | `api`, `network`, `unexpected_reply` | model calls | poster skipped / no report |
//! | `malformed_response`, `not_an_object`, `missing_filename` | extraction parsing | poster skipped |
//! | `image`, `scale` | poster decoding and preparation | poster skipped |
//! | `metrics_load` | metrics table loading (CSV or workbook) | metrics stay absent |
//! | `io` | file reads | depends on the caller |

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type InsightResult<T> = Result<T, InsightError>;

#[derive(Debug, Error)]
pub enum InsightError {
    /// A session setting failed validation.
    #[error("Configuration error in '{field}': {reason}")]
    Config { field: String, reason: String },

    /// The API credential is missing or was rejected.
    #[error("Credential error: {0}")]
    Credential(String),

    /// The model endpoint answered with a non-success status.
    #[error("Model API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Transport-level failure talking to the model endpoint.
    #[error("Network error during {operation}: {source}")]
    Network {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered 2xx but carried no usable reply text.
    #[error("Model returned no usable reply: {0}")]
    UnexpectedReply(String),

    /// The model reply was not valid JSON after fence stripping.
    #[error("Model reply is not valid JSON: {source}")]
    MalformedResponse {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    /// The model reply parsed, but not to a JSON object.
    #[error("Model reply is JSON but not an object (got {kind})")]
    NotAnObject { kind: &'static str },

    /// A record cannot be built without a caller-supplied filename.
    #[error("Poster filename is empty")]
    MissingFilename,

    /// The poster could not be decoded or re-encoded.
    #[error("Image error for '{filename}': {source}")]
    Image {
        filename: String,
        #[source]
        source: image::ImageError,
    },

    /// Downscaling the poster failed.
    #[error("Scaling error for '{filename}': {source}")]
    Scale {
        filename: String,
        #[source]
        source: poster_scale::cpu::ScaleError,
    },

    /// The metrics spreadsheet could not be read.
    #[error("Metrics table could not be loaded: {0}")]
    MetricsLoad(String),

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl InsightError {
    /// Create a configuration error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a network error
    pub fn network(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            operation: operation.into(),
            source,
        }
    }

    /// Create an image error
    pub fn image(filename: impl Into<String>, source: image::ImageError) -> Self {
        Self::Image {
            filename: filename.into(),
            source,
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Credential(_) => "credential",
            Self::Api { .. } => "api",
            Self::Network { .. } => "network",
            Self::UnexpectedReply(_) => "unexpected_reply",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::NotAnObject { .. } => "not_an_object",
            Self::MissingFilename => "missing_filename",
            Self::Image { .. } => "image",
            Self::Scale { .. } => "scale",
            Self::MetricsLoad(_) => "metrics_load",
            Self::Io { .. } => "io",
        }
    }

    /// Whether the failure came from the model's output rather than transport
    /// or local processing.
    pub fn is_model_output(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse { .. } | Self::NotAnObject { .. }
        )
    }
}

impl From<csv::Error> for InsightError {
    fn from(e: csv::Error) -> Self {
        Self::MetricsLoad(e.to_string())
    }
}
