//! Error taxonomy for the harvest pipeline.

use thiserror::Error;

/// Errors produced while harvesting artifacts.
///
/// `UpstreamUnavailable` and `InvalidConfig` are fatal for a run. Every other
/// variant is scoped to a single artifact and is collected into the run
/// summary instead of aborting the batch.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Listing artifacts failed (network, auth, rate limit exhausted)
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Artifact filename does not follow the five-field naming convention
    #[error("malformed artifact name {name:?}: {reason}")]
    MalformedName { name: String, reason: String },

    /// Payload download failed
    #[error("download failed for {name}: {reason}")]
    DownloadFailed { name: String, reason: String },

    /// Writing the payload into the destination tree failed
    #[error("write failed for {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    /// Configuration rejected before the run started
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Digest string could not be parsed
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarvestError {
    /// Whether this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::UpstreamUnavailable(_) | HarvestError::InvalidConfig(_)
        )
    }

    /// Stable short name used in logs and run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            HarvestError::UpstreamUnavailable(_) => "upstream_unavailable",
            HarvestError::MalformedName { .. } => "malformed_name",
            HarvestError::DownloadFailed { .. } => "download_failed",
            HarvestError::WriteFailed { .. } => "write_failed",
            HarvestError::InvalidConfig(_) => "invalid_config",
            HarvestError::InvalidDigest(_) => "invalid_digest",
            HarvestError::Io(_) => "io",
            HarvestError::Json(_) => "json",
        }
    }
}

impl From<reqwest::Error> for HarvestError {
    fn from(err: reqwest::Error) -> Self {
        HarvestError::UpstreamUnavailable(err.to_string())
    }
}

/// Result type for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;
