//! Remote artifact descriptors and the eligibility window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// One artifact as advertised by the CI provider.
///
/// Only the fields the pipeline needs are kept; the provider response is
/// mapped into this shape by the source implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Provider-assigned identifier
    pub id: u64,
    /// Artifact filename, which also encodes its destination
    pub filename: String,
    /// When the CI run produced the artifact
    pub created_at: DateTime<Utc>,
    /// After this instant the payload can no longer be downloaded
    pub expires_at: DateTime<Utc>,
    /// Opaque reference handed back to the source for downloading
    pub download_ref: String,
    /// Payload digest, when the provider advertises one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

impl ArtifactDescriptor {
    pub fn new(
        id: u64,
        filename: impl Into<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        download_ref: impl Into<String>,
    ) -> Self {
        Self {
            id,
            filename: filename.into(),
            created_at,
            expires_at,
            download_ref: download_ref.into(),
            digest: None,
        }
    }

    /// Attach a provider digest.
    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Age relative to `now`. Negative for artifacts stamped in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

/// Why an artifact was dropped before reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ineligibility {
    Expired,
    OutsideWindow,
}

impl std::fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ineligibility::Expired => write!(f, "expired"),
            Ineligibility::OutsideWindow => write!(f, "outside_window"),
        }
    }
}

/// Check whether `artifact` should be processed in a run happening at `now`.
///
/// An artifact is eligible when it has not expired and was created no more
/// than `window` ago. The window bound is inclusive.
pub fn check_eligibility(
    now: DateTime<Utc>,
    artifact: &ArtifactDescriptor,
    window: Duration,
) -> Result<(), Ineligibility> {
    if artifact.is_expired(now) {
        return Err(Ineligibility::Expired);
    }
    if artifact.age(now) > window {
        return Err(Ineligibility::OutsideWindow);
    }
    Ok(())
}

/// Boolean form of [`check_eligibility`].
pub fn is_eligible(now: DateTime<Utc>, artifact: &ArtifactDescriptor, window: Duration) -> bool {
    check_eligibility(now, artifact, window).is_ok()
}
