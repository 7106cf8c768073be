//! Copy / replace / skip decision for a single artifact.
//!
//! Everything here is pure: callers gather the local file state and the
//! remote version up front and this module only compares them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// State of the file already present at a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVersion {
    pub digest: Digest,
    pub modified: DateTime<Utc>,
}

/// The incoming remote artifact, reduced to what the decision needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteVersion {
    pub digest: Digest,
    pub created: DateTime<Utc>,
}

/// Outcome of reconciling one artifact against the destination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Nothing exists at the destination
    Create,
    /// Content differs and the remote is strictly newer
    Replace,
    /// Same content, or the remote is not newer
    Skip,
}

impl Decision {
    /// Whether the payload must be written.
    pub fn writes(&self) -> bool {
        matches!(self, Decision::Create | Decision::Replace)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Create => write!(f, "create"),
            Decision::Replace => write!(f, "replace"),
            Decision::Skip => write!(f, "skip"),
        }
    }
}

/// Decide what to do with `remote` given the current `local` file, if any.
pub fn reconcile(local: Option<&LocalVersion>, remote: &RemoteVersion) -> Decision {
    match local {
        None => Decision::Create,
        Some(local) if local.digest == remote.digest => Decision::Skip,
        Some(local) if remote.created > local.modified => Decision::Replace,
        Some(_) => Decision::Skip,
    }
}

/// Whether a remote artifact created at `created` could ever replace `local`.
///
/// When this is false the outcome is `Skip` whatever the remote content is,
/// so the payload need not be downloaded to hash it.
pub fn could_replace(local: Option<&LocalVersion>, created: DateTime<Utc>) -> bool {
    match local {
        None => true,
        Some(local) => created > local.modified,
    }
}
