//! ABI Harvest Core
//!
//! Pulls ABI test result artifacts out of a CI provider and files them into
//! a canonical tree keyed by tester, tester version, package, package
//! version and result type. Files are only written when they are new or a
//! strictly newer, different version of what is already on disk.

pub mod artifact;
pub mod config;
pub mod digest;
pub mod error;
pub mod layout;
pub mod obs;
pub mod pipeline;
pub mod reconcile;
pub mod source;
pub mod summary;
pub mod telemetry;
pub mod tree;

pub use artifact::{check_eligibility, is_eligible, ArtifactDescriptor, Ineligibility};
pub use config::HarvestConfig;
pub use digest::Digest;
pub use error::{HarvestError, Result};
pub use layout::{ArtifactKey, DestinationLayout};
pub use pipeline::{process_artifact, select_batch, Batch, Harvester};
pub use reconcile::{could_replace, reconcile, Decision, LocalVersion, RemoteVersion};
pub use source::{ArtifactSource, GitHubArtifactSource, GitHubConfig, MemoryArtifactSource};
pub use summary::{
    write_summary_json, ArtifactReport, ArtifactStatus, OutcomeCounts, RunSummary, SkipReason,
};
pub use telemetry::init_tracing;
pub use tree::ArtifactTree;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
