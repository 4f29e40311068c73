//! Bundle quarantined malware samples into a single archive.
//!
//! Each sample is gzip-compressed on its own and appended as a
//! length-prefixed frame (see [`frame`]). Sources are deleted only after a
//! run that archived everything without error.

pub mod archive;
pub mod cleanup;
pub mod compress;
pub mod config;
pub mod error;
pub mod frame;
pub mod pack;
pub mod report;
pub mod scan;

pub use archive::{run, ArchiveRun, ArchiveWriter};
pub use cleanup::{cleanup, CleanupReport, PendingDeletions};
pub use compress::{compress, gzip_bound, CompressedPayload};
pub use config::{PackConfig, DEFAULT_PREFIX};
pub use error::{Error, Result};
pub use frame::{encode_frame, write_frame, Frame, FrameReader, FrameSummary, MAX_NAME_LEN};
pub use pack::{pack, pack_at, PackOutcome};
pub use report::RunReport;
pub use scan::{is_quarantine_file, scan, QuarantineEntry};
