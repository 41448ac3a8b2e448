//! Error types shared across Beatreel crates.

use std::path::PathBuf;

/// Top-level error type for Beatreel operations.
#[derive(Debug, thiserror::Error)]
pub enum BeatreelError {
    /// Bad segment reference, unresolvable BPM, invalid trim, bad preset.
    /// Raised before any subprocess is spawned.
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Missing asset: {path}")]
    MissingAsset { path: PathBuf },

    /// The encoder exceeded its wall-clock budget and its process group was killed.
    #[error("Encoder timed out after {timeout_secs}s ({stage})")]
    Timeout { timeout_secs: u64, stage: String },

    #[error("Encoder exited with {status}: {stderr_tail}")]
    Encoder { status: String, stderr_tail: String },

    #[error("Encoder binary not found: {binary}")]
    EncoderNotFound { binary: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Verification failed: {message}")]
    Verification { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using BeatreelError.
pub type BeatreelResult<T> = Result<T, BeatreelError>;

impl BeatreelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn verification(msg: impl Into<String>) -> Self {
        Self::Verification {
            message: msg.into(),
        }
    }

    pub fn timeout(timeout_secs: u64, stage: impl Into<String>) -> Self {
        Self::Timeout {
            timeout_secs,
            stage: stage.into(),
        }
    }

    /// Whether a job failing with this error may be retried as-is.
    ///
    /// Only timeouts qualify: rendering is a pure function of the EDL and the
    /// cache, and the cache never holds partial files.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
