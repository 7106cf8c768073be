//! Structured observability hooks for harvest runs.
//!
//! This module provides:
//! - A run-scoped tracing span via `harvest_span`
//! - Emission functions for lifecycle events: start, listing, per-artifact
//!   outcome, finish
//!
//! Events are emitted at `info!` level; per-artifact failures at `warn!`.

use tracing::{debug, info, warn};

use crate::artifact::Ineligibility;
use crate::error::HarvestError;
use crate::summary::{ArtifactStatus, OutcomeCounts};

/// Run-scoped span tagged with the run id and repository.
///
/// # Example
///
/// ```ignore
/// harvest(...).instrument(harvest_span(&run_id, "owner/repo")).await
/// // every event inside carries run_id and repository
/// ```
pub fn harvest_span(run_id: &str, repository: &str) -> tracing::Span {
    tracing::info_span!("harvest.run", run_id = %run_id, repository = %repository)
}

pub fn emit_harvest_started(run_id: &str, repository: &str, window_days: i64) {
    info!(
        event = "harvest.started",
        run_id = %run_id,
        repository = %repository,
        window_days = window_days,
    );
}

pub fn emit_listed(listed: usize, eligible: usize) {
    info!(event = "harvest.listed", listed = listed, eligible = eligible);
}

/// Emit event: artifact dropped by the eligibility filter.
pub fn emit_filtered(filename: &str, reason: Ineligibility) {
    debug!(event = "artifact.filtered", artifact = %filename, reason = %reason);
}

/// Emit event: final status of one artifact.
pub fn emit_artifact_outcome(filename: &str, status: &ArtifactStatus) {
    match status {
        ArtifactStatus::Failed { kind, message } => {
            warn!(event = "artifact.failed", artifact = %filename, kind = %kind, error = %message);
        }
        other => {
            info!(event = "artifact.outcome", artifact = %filename, outcome = other.label());
        }
    }
}

pub fn emit_harvest_finished(counts: &OutcomeCounts, duration_ms: u64) {
    info!(
        event = "harvest.finished",
        created = counts.created,
        replaced = counts.replaced,
        skipped = counts.skipped,
        errored = counts.errored,
        duration_ms = duration_ms,
    );
}

/// Emit event: run aborted by a fatal error.
pub fn emit_harvest_aborted(error: &HarvestError) {
    tracing::error!(event = "harvest.aborted", kind = error.kind(), error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harvest_span_create() {
        let span = harvest_span("test-run-id", "o/r");
        let _entered = span.enter();
        emit_listed(3, 1);
    }
}
