//! Artifact filename convention and the canonical destination layout.
//!
//! Filenames are split on `-` into exactly five fields:
//!
//! ```text
//! <tester>-<tester-version>-<package>-<package-version>-<result-type>[.<ext>]
//! ```
//!
//! The result type is the fifth field up to its first `.`; any extension
//! stays part of the filename only. A file is stored at
//! `<root>/<tester>/<tester-version>/<package>/<package-version>/<result-type>/<filename>`.
//!
//! Since `-` is the delimiter, no field may itself contain one. Versions keep
//! their dots (`1.2.11`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Field delimiter in artifact filenames.
pub const FIELD_DELIMITER: char = '-';

/// Number of delimiter-separated fields in a well-formed filename.
pub const FIELD_COUNT: usize = 5;

/// The identity encoded in an artifact filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub tester: String,
    pub tester_version: String,
    pub package: String,
    pub package_version: String,
    pub result_type: String,
}

impl ArtifactKey {
    /// Parse a filename according to the convention above.
    pub fn parse(filename: &str) -> Result<Self> {
        let malformed = |reason: &str| HarvestError::MalformedName {
            name: filename.to_string(),
            reason: reason.to_string(),
        };

        if filename.contains('/') || filename.contains('\\') {
            return Err(malformed("filename contains a path separator"));
        }

        let fields: Vec<&str> = filename.split(FIELD_DELIMITER).collect();
        if fields.len() != FIELD_COUNT {
            return Err(malformed(&format!(
                "expected {} '{}'-separated fields, found {}",
                FIELD_COUNT,
                FIELD_DELIMITER,
                fields.len()
            )));
        }

        let result_type = fields[4].split('.').next().unwrap_or_default();
        let parts = [fields[0], fields[1], fields[2], fields[3], result_type];

        for part in parts {
            if part.is_empty() {
                return Err(malformed("empty field"));
            }
            if part == "." || part == ".." {
                return Err(malformed("field is a relative path component"));
            }
        }

        Ok(Self {
            tester: parts[0].to_string(),
            tester_version: parts[1].to_string(),
            package: parts[2].to_string(),
            package_version: parts[3].to_string(),
            result_type: parts[4].to_string(),
        })
    }

    /// Directory for this key, relative to the tree root.
    pub fn relative_dir(&self) -> PathBuf {
        [
            &self.tester,
            &self.tester_version,
            &self.package,
            &self.package_version,
            &self.result_type,
        ]
        .iter()
        .collect()
    }
}

/// Resolves artifact filenames to their place in a destination tree.
#[derive(Debug, Clone)]
pub struct DestinationLayout {
    root: PathBuf,
}

impl DestinationLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical path for `filename`, or `MalformedName`.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let key = ArtifactKey::parse(filename)?;
        Ok(self.root.join(key.relative_dir()).join(filename))
    }
}
