//! The on-disk result tree.
//!
//! Reads report what is already harvested; writes are atomic renames that
//! stamp the file with the artifact's creation time.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::digest::Digest;
use crate::error::{HarvestError, Result};
use crate::layout::DestinationLayout;
use crate::reconcile::LocalVersion;

/// Filesystem destination tree for harvested artifacts.
///
/// Layout: `<root>/<tester>/<tester-version>/<package>/<package-version>/<result-type>/<filename>`.
/// Files are only ever created or replaced, never removed.
#[derive(Debug, Clone)]
pub struct ArtifactTree {
    layout: DestinationLayout,
}

impl ArtifactTree {
    /// Open a tree rooted at `root`. Creates `root` if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = DestinationLayout::new(root);
        fs::create_dir_all(layout.root())?;
        Ok(Self { layout })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Canonical path for `filename`.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        self.layout.resolve(filename)
    }

    /// Hash and mtime of the file at `path`, or `None` if nothing is there.
    pub fn inspect(&self, path: &Path) -> Result<Option<LocalVersion>> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(HarvestError::WriteFailed {
                path: path.display().to_string(),
                reason: "destination exists and is not a regular file".to_string(),
            });
        }
        let modified: DateTime<Utc> = metadata.modified()?.into();
        Ok(Some(LocalVersion {
            digest: Digest::of_file(path)?,
            modified,
        }))
    }

    /// Atomically place `payload` at `path`, stamping it with `modified`.
    ///
    /// The payload goes to a temp file in the destination directory and is
    /// renamed over any existing file, so readers never see a partial write.
    pub fn write(&self, path: &Path, payload: &[u8], modified: DateTime<Utc>) -> Result<()> {
        let write_failed = |e: std::io::Error| HarvestError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let dir = path.parent().ok_or_else(|| HarvestError::WriteFailed {
            path: path.display().to_string(),
            reason: "destination has no parent directory".to_string(),
        })?;
        fs::create_dir_all(dir).map_err(write_failed)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
        tmp.write_all(payload).map_err(write_failed)?;
        tmp.as_file().sync_all().map_err(write_failed)?;
        tmp.as_file()
            .set_modified(SystemTime::from(modified))
            .map_err(write_failed)?;
        tmp.persist(path).map_err(|e| write_failed(e.error))?;

        Ok(())
    }
}
