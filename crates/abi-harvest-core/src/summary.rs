//! Run summary: per-artifact reports and outcome counts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::reconcile::Decision;

/// Why an artifact ended up skipped, when there is more to say than "same file".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Local content identical, or remote not newer
    UpToDate,
    /// A newer artifact with the same filename was in the same batch
    Superseded,
    /// Payload was zero bytes
    EmptyPayload,
}

/// What happened to one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus {
    Created,
    Replaced,
    Skipped { reason: SkipReason },
    Failed { kind: String, message: String },
}

impl ArtifactStatus {
    pub fn from_decision(decision: Decision) -> Self {
        match decision {
            Decision::Create => ArtifactStatus::Created,
            Decision::Replace => ArtifactStatus::Replaced,
            Decision::Skip => ArtifactStatus::Skipped {
                reason: SkipReason::UpToDate,
            },
        }
    }

    pub fn from_error(err: &HarvestError) -> Self {
        ArtifactStatus::Failed {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArtifactStatus::Created => "created",
            ArtifactStatus::Replaced => "replaced",
            ArtifactStatus::Skipped { .. } => "skipped",
            ArtifactStatus::Failed { .. } => "failed",
        }
    }
}

/// Report for a single processed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub id: u64,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(flatten)]
    pub status: ArtifactStatus,
}

/// Outcome counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub created: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, status: &ArtifactStatus) {
        match status {
            ArtifactStatus::Created => self.created += 1,
            ArtifactStatus::Replaced => self.replaced += 1,
            ArtifactStatus::Skipped { .. } => self.skipped += 1,
            ArtifactStatus::Failed { .. } => self.errored += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.replaced + self.skipped + self.errored
    }
}

/// Everything a harvest run did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub repository: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Artifacts returned by the listing
    pub listed: usize,
    /// Artifacts that passed the eligibility filter
    pub eligible: usize,
    pub counts: OutcomeCounts,
    pub artifacts: Vec<ArtifactReport>,
}

impl RunSummary {
    pub fn new(
        run_id: String,
        repository: String,
        started_at: DateTime<Utc>,
        listed: usize,
        eligible: usize,
        mut artifacts: Vec<ArtifactReport>,
    ) -> Self {
        artifacts.sort_by(|a, b| a.filename.cmp(&b.filename).then(a.id.cmp(&b.id)));
        let mut counts = OutcomeCounts::default();
        for report in &artifacts {
            counts.record(&report.status);
        }
        RunSummary {
            run_id,
            repository,
            started_at,
            finished_at: Utc::now(),
            listed,
            eligible,
            counts,
            artifacts,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ArtifactReport> {
        self.artifacts
            .iter()
            .filter(|r| matches!(r.status, ArtifactStatus::Failed { .. }))
    }

    /// Human-readable summary for terminal output.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Harvest {} ({})\n", self.repository, self.run_id));
        out.push_str(&format!(
            "  listed: {}, eligible: {}\n",
            self.listed, self.eligible
        ));
        out.push_str(&format!(
            "  created: {}, replaced: {}, skipped: {}, errored: {}\n",
            self.counts.created, self.counts.replaced, self.counts.skipped, self.counts.errored
        ));
        for report in self.failures() {
            if let ArtifactStatus::Failed { kind, message } = &report.status {
                out.push_str(&format!("  ! {} [{}] {}\n", report.filename, kind, message));
            }
        }
        out
    }
}

/// Write the summary as pretty JSON.
pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<()> {
    let content = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(filename: &str, status: ArtifactStatus) -> ArtifactReport {
        ArtifactReport {
            id: 1,
            filename: filename.to_string(),
            destination: None,
            status,
        }
    }

    fn sample() -> RunSummary {
        RunSummary::new(
            "run-1".to_string(),
            "o/r".to_string(),
            Utc::now(),
            5,
            4,
            vec![
                report("b-1-c-2-lib.xml", ArtifactStatus::Created),
                report("a-1-c-2-lib.xml", ArtifactStatus::Replaced),
                report(
                    "c-1-c-2-lib.xml",
                    ArtifactStatus::Skipped {
                        reason: SkipReason::UpToDate,
                    },
                ),
                report(
                    "badname.xml",
                    ArtifactStatus::Failed {
                        kind: "malformed_name".to_string(),
                        message: "expected 5 fields".to_string(),
                    },
                ),
            ],
        )
    }

    #[test]
    fn test_counts() {
        let summary = sample();
        assert_eq!(summary.counts.created, 1);
        assert_eq!(summary.counts.replaced, 1);
        assert_eq!(summary.counts.skipped, 1);
        assert_eq!(summary.counts.errored, 1);
        assert_eq!(summary.counts.total(), 4);
        assert_eq!(summary.artifacts[0].filename, "a-1-c-2-lib.xml");
    }

    #[test]
    fn test_render_text_lists_failures() {
        let text = sample().render_text();
        assert!(text.contains("created: 1, replaced: 1, skipped: 1, errored: 1"));
        assert!(text.contains("badname.xml [malformed_name]"));
    }

    #[test]
    fn test_json_shape() {
        let v = serde_json::to_value(sample()).unwrap();
        let first = &v["artifacts"][0];
        assert_eq!(first["status"], "replaced");
        let skipped = &v["artifacts"][2];
        assert_eq!(skipped["reason"], "up_to_date");
        assert_eq!(v["counts"]["errored"], 1);
    }

    #[test]
    fn test_write_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = sample();
        write_summary_json(&path, &summary).unwrap();

        let back: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.counts, summary.counts);
    }
}
