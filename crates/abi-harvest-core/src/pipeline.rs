//! Harvest pipeline: list, filter, resolve, reconcile, fetch and write.
//!
//! A listing failure aborts the run. Everything after that is per artifact:
//! failures are recorded in the summary and the batch carries on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::artifact::{check_eligibility, ArtifactDescriptor};
use crate::config::HarvestConfig;
use crate::digest::Digest;
use crate::error::{HarvestError, Result};
use crate::obs::{
    emit_artifact_outcome, emit_filtered, emit_harvest_aborted, emit_harvest_finished,
    emit_harvest_started, emit_listed, harvest_span,
};
use crate::reconcile::{could_replace, reconcile, Decision, LocalVersion, RemoteVersion};
use crate::source::ArtifactSource;
use crate::summary::{ArtifactReport, ArtifactStatus, RunSummary, SkipReason};
use crate::tree::ArtifactTree;

/// Artifacts selected for one run.
#[derive(Debug, Default)]
pub struct Batch {
    /// Eligible artifacts, one per filename, sorted by filename
    pub selected: Vec<ArtifactDescriptor>,
    /// Eligible artifacts shadowed by a newer one with the same filename
    pub superseded: Vec<ArtifactDescriptor>,
}

/// Apply the eligibility filter and keep the newest artifact per filename.
pub fn select_batch(
    now: DateTime<Utc>,
    listed: Vec<ArtifactDescriptor>,
    window: Duration,
) -> Batch {
    let mut newest: HashMap<String, ArtifactDescriptor> = HashMap::new();
    let mut superseded = Vec::new();

    for artifact in listed {
        if let Err(reason) = check_eligibility(now, &artifact, window) {
            emit_filtered(&artifact.filename, reason);
            continue;
        }
        let keep_current = newest.get(&artifact.filename).is_some_and(|current| {
            (current.created_at, current.id) >= (artifact.created_at, artifact.id)
        });
        if keep_current {
            superseded.push(artifact);
        } else if let Some(previous) = newest.insert(artifact.filename.clone(), artifact) {
            superseded.push(previous);
        }
    }

    let mut selected: Vec<_> = newest.into_values().collect();
    selected.sort_by(|a, b| a.filename.cmp(&b.filename));
    Batch {
        selected,
        superseded,
    }
}

/// Runs harvests of one repository into one destination tree.
pub struct Harvester {
    source: Arc<dyn ArtifactSource>,
    tree: ArtifactTree,
    config: HarvestConfig,
}

impl Harvester {
    pub fn new(source: Arc<dyn ArtifactSource>, tree: ArtifactTree, config: HarvestConfig) -> Self {
        Harvester {
            source,
            tree,
            config,
        }
    }

    pub fn tree(&self) -> &ArtifactTree {
        &self.tree
    }

    /// Harvest everything currently eligible.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_at(Utc::now()).await
    }

    /// Harvest as if the current time were `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        let span = harvest_span(&run_id, &self.config.repository);
        self.execute(run_id, now).instrument(span).await
    }

    async fn execute(&self, run_id: String, now: DateTime<Utc>) -> Result<RunSummary> {
        let started = Instant::now();
        let started_at = Utc::now();
        emit_harvest_started(&run_id, &self.config.repository, self.config.window_days);

        let (window, since) = match cutoff(&self.config, now) {
            Ok(bounds) => bounds,
            Err(e) => {
                emit_harvest_aborted(&e);
                return Err(e);
            }
        };

        let listed = match self.source.list(since).await {
            Ok(listed) => listed,
            Err(e) => {
                emit_harvest_aborted(&e);
                return Err(e);
            }
        };
        let listed_count = listed.len();

        let batch = select_batch(now, listed, window);
        let eligible = batch.selected.len() + batch.superseded.len();
        emit_listed(listed_count, eligible);

        let mut reports: Vec<ArtifactReport> = batch
            .superseded
            .into_iter()
            .map(|artifact| {
                let status = ArtifactStatus::Skipped {
                    reason: SkipReason::Superseded,
                };
                emit_artifact_outcome(&artifact.filename, &status);
                ArtifactReport {
                    id: artifact.id,
                    filename: artifact.filename,
                    destination: None,
                    status,
                }
            })
            .collect();

        reports.extend(self.process_all(batch.selected).await);

        let summary = RunSummary::new(
            run_id,
            self.config.repository.clone(),
            started_at,
            listed_count,
            eligible,
            reports,
        );
        emit_harvest_finished(&summary.counts, started.elapsed().as_millis() as u64);
        Ok(summary)
    }

    /// Process artifacts on a bounded pool of tasks.
    async fn process_all(&self, artifacts: Vec<ArtifactDescriptor>) -> Vec<ArtifactReport> {
        let sem = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let source = Arc::clone(&self.source);
            let tree = self.tree.clone();
            let sem = Arc::clone(&sem);
            let identity = (artifact.id, artifact.filename.clone());

            let task = tokio::spawn(
                async move {
                    let _permit = sem.acquire_owned().await.ok();
                    process_artifact(source.as_ref(), &tree, artifact).await
                }
                .in_current_span(),
            );
            tasks.push((identity, task));
        }

        let mut reports = Vec::with_capacity(tasks.len());
        for ((id, filename), task) in tasks {
            let report = task.await.unwrap_or_else(|e| {
                let status = ArtifactStatus::Failed {
                    kind: "task_failed".to_string(),
                    message: e.to_string(),
                };
                emit_artifact_outcome(&filename, &status);
                ArtifactReport {
                    id,
                    filename,
                    destination: None,
                    status,
                }
            });
            reports.push(report);
        }
        reports
    }
}

/// Resolve, reconcile and (if needed) fetch and write a single artifact.
pub async fn process_artifact(
    source: &dyn ArtifactSource,
    tree: &ArtifactTree,
    artifact: ArtifactDescriptor,
) -> ArtifactReport {
    let (destination, status) = match tree.resolve(&artifact.filename) {
        Ok(destination) => {
            let status = match harvest_one(source, tree, &artifact, &destination).await {
                Ok(status) => status,
                Err(e) => ArtifactStatus::from_error(&e),
            };
            (Some(destination), status)
        }
        Err(e) => (None, ArtifactStatus::from_error(&e)),
    };

    emit_artifact_outcome(&artifact.filename, &status);
    ArtifactReport {
        id: artifact.id,
        filename: artifact.filename,
        destination,
        status,
    }
}

async fn harvest_one(
    source: &dyn ArtifactSource,
    tree: &ArtifactTree,
    artifact: &ArtifactDescriptor,
    destination: &Path,
) -> Result<ArtifactStatus> {
    let local = inspect(tree, destination).await?;
    let created = artifact.created_at;

    if !could_replace(local.as_ref(), created) {
        debug!(artifact = %artifact.filename, "local copy is at least as new, not downloading");
        return Ok(ArtifactStatus::from_decision(Decision::Skip));
    }

    if let Some(digest) = artifact.digest {
        let decision = reconcile(local.as_ref(), &RemoteVersion { digest, created });
        if !decision.writes() {
            debug!(artifact = %artifact.filename, digest = %digest.short(), "advertised digest matches local copy");
            return Ok(ArtifactStatus::from_decision(decision));
        }
    }

    let payload = source.fetch(artifact).await?;
    if payload.is_empty() {
        return Ok(ArtifactStatus::Skipped {
            reason: SkipReason::EmptyPayload,
        });
    }

    let digest = Digest::compute(&payload);
    if let Some(advertised) = artifact.digest {
        if advertised != digest {
            return Err(HarvestError::DownloadFailed {
                name: artifact.filename.clone(),
                reason: format!(
                    "digest mismatch: advertised {}, received {}",
                    advertised.short(),
                    digest.short()
                ),
            });
        }
    }

    let decision = reconcile(local.as_ref(), &RemoteVersion { digest, created });
    if decision.writes() {
        write(tree, destination, payload, created).await?;
    }
    Ok(ArtifactStatus::from_decision(decision))
}

/// Eligibility window and the oldest creation time it admits.
fn cutoff(config: &HarvestConfig, now: DateTime<Utc>) -> Result<(Duration, DateTime<Utc>)> {
    let window = config.window()?;
    let since = now.checked_sub_signed(window).ok_or_else(|| {
        HarvestError::InvalidConfig(format!(
            "window of {} days reaches before the earliest representable time",
            config.window_days
        ))
    })?;
    Ok((window, since))
}

async fn inspect(tree: &ArtifactTree, destination: &Path) -> Result<Option<LocalVersion>> {
    let tree = tree.clone();
    let path = destination.to_path_buf();
    tokio::task::spawn_blocking(move || tree.inspect(&path))
        .await
        .map_err(|e| write_failed(destination, e.to_string()))?
        .map_err(|e| match e {
            HarvestError::Io(io) => write_failed(destination, io.to_string()),
            other => other,
        })
}

async fn write(
    tree: &ArtifactTree,
    destination: &Path,
    payload: Vec<u8>,
    created: DateTime<Utc>,
) -> Result<()> {
    let tree = tree.clone();
    let path: PathBuf = destination.to_path_buf();
    tokio::task::spawn_blocking(move || tree.write(&path, &payload, created))
        .await
        .map_err(|e| write_failed(destination, e.to_string()))?
}

fn write_failed(path: &Path, reason: String) -> HarvestError {
    HarvestError::WriteFailed {
        path: path.display().to_string(),
        reason,
    }
}
