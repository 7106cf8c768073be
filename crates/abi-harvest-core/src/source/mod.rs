//! Upstream artifact sources.
//!
//! - `GitHubArtifactSource`: GitHub Actions artifacts REST API
//! - `MemoryArtifactSource`: in-memory fake for tests and dry runs

pub mod github;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::artifact::ArtifactDescriptor;
use crate::error::Result;

pub use github::{GitHubArtifactSource, GitHubConfig};
pub use memory::MemoryArtifactSource;

/// A CI provider that can list artifacts and hand out their payloads.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// List artifacts, newest first where the provider allows it.
    ///
    /// `since` is a paging hint: a source may stop listing once it has seen
    /// artifacts created before it. Older entries may still be returned and
    /// are filtered by the caller. Failure is `UpstreamUnavailable`.
    async fn list(&self, since: DateTime<Utc>) -> Result<Vec<ArtifactDescriptor>>;

    /// Download the payload for `artifact`. Failure is `DownloadFailed`.
    async fn fetch(&self, artifact: &ArtifactDescriptor) -> Result<Vec<u8>>;
}
