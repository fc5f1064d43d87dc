#![allow(clippy::module_name_repetitions)]
//! Canonical file names inside the output directory.

use std::path::{Path, PathBuf};

/// Per-postal-code aggregate table.
pub const UNIT_TABLE: &str = "master_pincode_risk.csv";
/// Monthly enrolment/update series.
pub const TIME_SERIES: &str = "master_time_series.csv";
/// Record-level left join of enrolments and updates.
pub const MERGED_RECORDS: &str = "raw_merged_data.csv";
/// Scored, geocoded risk table.
pub const RISK_TABLE: &str = "master_table.csv";
/// Optimizer output.
pub const CLUSTER_SNAPSHOT: &str = "route_clusters.json";

/// Resolves artifact paths under one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    root: PathBuf,
}

impl ArtifactPaths {
    /// Paths rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output directory itself.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// [`UNIT_TABLE`] under the root.
    #[must_use]
    pub fn unit_table(&self) -> PathBuf {
        self.root.join(UNIT_TABLE)
    }

    /// [`TIME_SERIES`] under the root.
    #[must_use]
    pub fn time_series(&self) -> PathBuf {
        self.root.join(TIME_SERIES)
    }

    /// [`MERGED_RECORDS`] under the root.
    #[must_use]
    pub fn merged_records(&self) -> PathBuf {
        self.root.join(MERGED_RECORDS)
    }

    /// [`RISK_TABLE`] under the root.
    #[must_use]
    pub fn risk_table(&self) -> PathBuf {
        self.root.join(RISK_TABLE)
    }

    /// [`CLUSTER_SNAPSHOT`] under the root.
    #[must_use]
    pub fn cluster_snapshot(&self) -> PathBuf {
        self.root.join(CLUSTER_SNAPSHOT)
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Sibling path used for atomic writes.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_under_root() {
        let paths = ArtifactPaths::new("out");
        assert_eq!(paths.risk_table(), Path::new("out/master_table.csv"));
        assert_eq!(
            paths.cluster_snapshot(),
            Path::new("out/route_clusters.json")
        );
        assert_eq!(
            tmp_path(&paths.unit_table()),
            Path::new("out/master_pincode_risk.csv.tmp")
        );
    }
}
