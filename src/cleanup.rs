//! Deletion of archived quarantine files.
//!
//! Sources are removed only when the run that archived them finished without
//! a single error. The gate is run-wide: one bad entry keeps every source,
//! including the ones that were written successfully.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

/// Paths whose frames are confirmed written, in archive order.
#[derive(Debug, Default)]
pub struct PendingDeletions {
    paths: Vec<PathBuf>,
}

impl PendingDeletions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: Vec<PathBuf>,
    /// Paths that could not be removed, with the reason.
    pub failed: Vec<(PathBuf, String)>,
    /// Set when the run had errors and nothing was attempted.
    pub skipped: bool,
}

/// Consume `pending`, deleting each path unless `had_errors` is set.
pub fn cleanup(pending: PendingDeletions, had_errors: bool) -> CleanupReport {
    let mut report = CleanupReport::default();

    if had_errors {
        if !pending.is_empty() {
            warn!(
                "Errors occurred during archiving; keeping {} archived file(s) in quarantine.",
                pending.len()
            );
        }
        report.skipped = true;
        return report;
    }

    for path in pending.paths {
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Successfully removed file '{}'.", path.display());
                report.deleted.push(path);
            }
            Err(err) => {
                error!("Unable to delete file '{}': {err}", path.display());
                report.failed.push((path, err.to_string()));
            }
        }
    }

    report
}
