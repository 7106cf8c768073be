//! In-memory artifact source (testing and dry runs)

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ArtifactSource;
use crate::artifact::ArtifactDescriptor;
use crate::error::{HarvestError, Result};

/// Artifact source serving descriptors and payloads from memory.
///
/// Payloads are keyed by `download_ref`. Counts every payload fetch so
/// callers can check which artifacts were actually downloaded.
#[derive(Debug, Default)]
pub struct MemoryArtifactSource {
    artifacts: Mutex<Vec<ArtifactDescriptor>>,
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    failing_downloads: Mutex<HashSet<String>>,
    listing_error: Mutex<Option<String>>,
    fetches: AtomicUsize,
}

impl MemoryArtifactSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact and its payload.
    pub fn insert(&self, artifact: ArtifactDescriptor, payload: impl Into<Vec<u8>>) {
        self.payloads
            .lock()
            .unwrap()
            .insert(artifact.download_ref.clone(), payload.into());
        self.artifacts.lock().unwrap().push(artifact);
    }

    /// Make downloads of `download_ref` fail.
    pub fn fail_download(&self, download_ref: &str) {
        self.failing_downloads
            .lock()
            .unwrap()
            .insert(download_ref.to_string());
    }

    /// Make listing fail with `UpstreamUnavailable(reason)`.
    pub fn fail_listing(&self, reason: &str) {
        *self.listing_error.lock().unwrap() = Some(reason.to_string());
    }

    /// Number of payload fetches served or attempted so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn reset_fetch_count(&self) {
        self.fetches.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactSource for MemoryArtifactSource {
    async fn list(&self, _since: DateTime<Utc>) -> Result<Vec<ArtifactDescriptor>> {
        if let Some(reason) = self.listing_error.lock().unwrap().clone() {
            return Err(HarvestError::UpstreamUnavailable(reason));
        }
        let mut artifacts = self.artifacts.lock().unwrap().clone();
        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(artifacts)
    }

    async fn fetch(&self, artifact: &ArtifactDescriptor) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self
            .failing_downloads
            .lock()
            .unwrap()
            .contains(&artifact.download_ref)
        {
            return Err(HarvestError::DownloadFailed {
                name: artifact.filename.clone(),
                reason: "simulated download failure".to_string(),
            });
        }

        self.payloads
            .lock()
            .unwrap()
            .get(&artifact.download_ref)
            .cloned()
            .ok_or_else(|| HarvestError::DownloadFailed {
                name: artifact.filename.clone(),
                reason: format!("no payload for {}", artifact.download_ref),
            })
    }
}
