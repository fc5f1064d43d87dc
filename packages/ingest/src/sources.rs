//! Discovery of raw extract files on disk.

use std::path::{Path, PathBuf};

use uli_map_ingest_models::EventKind;

/// A raw extract file tagged with the event kind it counts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path to the CSV file.
    pub path: PathBuf,
    /// Event kind every count in the file is credited to.
    pub kind: EventKind,
}

/// A directory of extracts sharing one event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDir {
    /// Root directory, walked recursively.
    pub dir: PathBuf,
    /// Event kind for every file found under `dir`.
    pub kind: EventKind,
}

/// Recursively collects every `*.csv` under each directory.
///
/// Missing or unreadable directories are logged and contribute nothing.
/// The result is sorted by path so repeated runs visit files in the same
/// order.
#[must_use]
pub fn discover(dirs: &[SourceDir]) -> Vec<SourceFile> {
    let mut files = Vec::new();

    for source_dir in dirs {
        let mut found = Vec::new();
        collect_csv_files(&source_dir.dir, &mut found);
        log::info!(
            "Found {} {} files under {}",
            found.len(),
            source_dir.kind,
            source_dir.dir.display()
        );
        files.extend(found.into_iter().map(|path| SourceFile {
            path,
            kind: source_dir.kind,
        }));
    }

    files.sort();
    files.dedup();
    files
}

fn collect_csv_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Skipping source directory {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_csv_files(&path, out);
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            out.push(path);
        }
    }
}
