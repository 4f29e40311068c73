//! One complete run: archive, then clean up.

use std::path::PathBuf;

use log::info;
use time::OffsetDateTime;

use crate::archive;
use crate::cleanup::{cleanup, CleanupReport};
use crate::config::PackConfig;
use crate::error::Result;
use crate::report::RunReport;

#[derive(Debug)]
pub struct PackOutcome {
    pub output_path: PathBuf,
    pub report: RunReport,
    pub cleanup: CleanupReport,
}

/// Archive the configured quarantine folder and clear it if the run was clean.
///
/// The archive is named after the run start time.
pub fn pack(config: &PackConfig) -> Result<PackOutcome> {
    pack_at(config, OffsetDateTime::now_utc().unix_timestamp())
}

pub fn pack_at(config: &PackConfig, unix_timestamp: i64) -> Result<PackOutcome> {
    let output_path = config.output_path(unix_timestamp);
    let (report, pending) = archive::run(&config.source_dir, &output_path)?.into_parts();

    if !report.had_errors {
        info!("Cleaning up...");
    }
    let cleanup = cleanup(pending, report.had_errors);

    Ok(PackOutcome {
        output_path,
        report,
        cleanup,
    })
}
