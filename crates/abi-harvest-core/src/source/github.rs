//! GitHub Actions artifact source.
//!
//! Lists `GET /repos/{owner}/{repo}/actions/artifacts` page by page and
//! downloads payloads from each artifact's `archive_download_url`.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ArtifactSource;
use crate::artifact::ArtifactDescriptor;
use crate::config::HarvestConfig;
use crate::digest::Digest;
use crate::error::{HarvestError, Result};

const ACCEPT_V3: &str = "application/vnd.github.v3+json";

/// Connection settings for the GitHub source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// API root, e.g. `https://api.github.com`
    pub api_base: String,
    /// `owner/name`
    pub repository: String,
    /// Token sent as `Authorization: token <TOKEN>`
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Artifacts requested per page
    pub page_size: u32,
    /// Wait after an HTTP 403 before retrying the same page
    pub rate_limit_backoff: StdDuration,
    /// Retries per page on HTTP 403 before giving up
    pub rate_limit_retries: u32,
    /// Assumed lifetime when the API omits `expires_at`
    pub retention_days: i64,
}

impl GitHubConfig {
    pub fn new(repository: &str) -> Self {
        GitHubConfig {
            api_base: "https://api.github.com".to_string(),
            repository: repository.to_string(),
            token: None,
            page_size: 100,
            rate_limit_backoff: StdDuration::from_secs(600),
            rate_limit_retries: 3,
            retention_days: 90,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Derive source settings from a harvest configuration.
    pub fn from_harvest(config: &HarvestConfig) -> Self {
        GitHubConfig {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            repository: config.repository.clone(),
            token: config.token.clone(),
            page_size: config.page_size,
            rate_limit_backoff: StdDuration::from_secs(config.rate_limit_backoff_secs),
            rate_limit_retries: config.rate_limit_retries,
            retention_days: config.retention_days,
        }
    }

    fn artifacts_url(&self) -> String {
        format!("{}/repos/{}/actions/artifacts", self.api_base, self.repository)
    }
}

/// One page of the artifacts listing.
#[derive(Debug, Deserialize)]
struct ArtifactPage {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    artifacts: Vec<WireArtifact>,
}

/// Artifact as returned by the GitHub API.
#[derive(Debug, Clone, Deserialize)]
struct WireArtifact {
    id: u64,
    name: String,
    #[serde(default)]
    expired: bool,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    archive_download_url: String,
    #[serde(default)]
    digest: Option<String>,
}

impl WireArtifact {
    fn into_descriptor(self, retention: Duration) -> Option<ArtifactDescriptor> {
        let Some(created_at) = self.created_at else {
            warn!(artifact = %self.name, id = self.id, "artifact has no created_at, ignoring");
            return None;
        };

        let mut expires_at = self
            .expires_at
            .or_else(|| created_at.checked_add_signed(retention))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if self.expired {
            expires_at = expires_at.min(created_at);
        }

        let mut descriptor = ArtifactDescriptor::new(
            self.id,
            self.name,
            created_at,
            expires_at,
            self.archive_download_url,
        );
        if let Some(raw) = self.digest.as_deref() {
            match Digest::parse_prefixed(raw) {
                Ok(d) => descriptor = descriptor.with_digest(d),
                Err(_) => debug!(artifact = %descriptor.filename, digest = %raw, "unrecognised digest"),
            }
        }
        Some(descriptor)
    }
}

/// Artifact source backed by the GitHub Actions REST API.
pub struct GitHubArtifactSource {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHubArtifactSource {
    /// Create a new GitHub source
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("abi-harvest/", env!("CARGO_PKG_VERSION")))
            .default_headers(Self::headers(&config)?)
            .build()
            .map_err(|e| HarvestError::InvalidConfig(format!("http client: {e}")))?;

        Ok(GitHubArtifactSource {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn headers(config: &GitHubConfig) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V3));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("token {token}"))
                .map_err(|_| HarvestError::InvalidConfig("token is not a valid header".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Fetch one listing page, waiting out rate limits.
    async fn get_page(&self, page: u32) -> Result<ArtifactPage> {
        let url = self.config.artifacts_url();
        let mut retries = 0;

        loop {
            debug!(url = %url, page, "requesting artifact page");
            let response = self
                .http_client
                .get(&url)
                .query(&[("per_page", self.config.page_size), ("page", page)])
                .send()
                .await?;

            match response.status() {
                status if status.is_success() => return Ok(response.json::<ArtifactPage>().await?),
                StatusCode::FORBIDDEN if retries < self.config.rate_limit_retries => {
                    retries += 1;
                    warn!(
                        page,
                        retry = retries,
                        backoff_secs = self.config.rate_limit_backoff.as_secs(),
                        "API rate limit likely exceeded, backing off"
                    );
                    tokio::time::sleep(self.config.rate_limit_backoff).await;
                }
                status => {
                    return Err(HarvestError::UpstreamUnavailable(format!(
                        "listing {} page {} returned HTTP {}",
                        self.config.repository, page, status
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl ArtifactSource for GitHubArtifactSource {
    async fn list(&self, since: DateTime<Utc>) -> Result<Vec<ArtifactDescriptor>> {
        let retention = Duration::try_days(self.config.retention_days)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| {
                HarvestError::InvalidConfig(format!(
                    "retention of {} days is out of range",
                    self.config.retention_days
                ))
            })?;
        let mut artifacts = Vec::new();
        let mut page = 1;

        loop {
            let body = self.get_page(page).await?;
            let fetched = body.artifacts.len();
            info!(
                repository = %self.config.repository,
                page,
                fetched,
                total = body.total_count,
                "retrieved artifact page"
            );

            let mut reached_cutoff = false;
            for wire in body.artifacts {
                if let Some(descriptor) = wire.into_descriptor(retention) {
                    reached_cutoff |= descriptor.created_at < since;
                    artifacts.push(descriptor);
                }
            }

            // Listing is newest first: once a page reaches past the window the
            // remaining pages are older still.
            if reached_cutoff {
                debug!(page, since = %since, "page reaches past the window, stopping");
                break;
            }
            if fetched < self.config.page_size as usize {
                break;
            }
            page += 1;
        }

        Ok(artifacts)
    }

    async fn fetch(&self, artifact: &ArtifactDescriptor) -> Result<Vec<u8>> {
        let download_failed = |reason: String| HarvestError::DownloadFailed {
            name: artifact.filename.clone(),
            reason,
        };

        let response = self
            .http_client
            .get(&artifact.download_ref)
            .send()
            .await
            .map_err(|e| download_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_failed(format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
