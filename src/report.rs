//! Per-run counters.

use std::time::Duration;

/// Outcome of one archive run.
///
/// `had_errors` gates cleanup: it is set by any skipped entry and by any entry
/// whose compressed output may have been truncated.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Candidates seen, including ones that failed.
    pub scanned: usize,

    /// Frames appended to the archive.
    pub entries_written: usize,

    /// Candidates skipped because of a recoverable error.
    pub skipped: usize,

    /// Entries written despite a possible-truncation warning.
    pub degraded: usize,

    /// Raw bytes read from archived files.
    pub bytes_in: u64,

    /// Bytes appended to the archive.
    pub bytes_out: u64,

    pub had_errors: bool,

    /// Operator-facing description of every problem.
    pub errors: Vec<String>,

    pub duration: Duration,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_written(&mut self, raw_len: u64, frame_len: u64) {
        self.entries_written += 1;
        self.bytes_in += raw_len;
        self.bytes_out += frame_len;
    }

    pub fn record_skipped(&mut self, error: String) {
        self.skipped += 1;
        self.had_errors = true;
        self.errors.push(error);
    }

    pub fn record_degraded(&mut self, warning: String) {
        self.degraded += 1;
        self.had_errors = true;
        self.errors.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        self.had_errors
    }

    pub fn summary(&self) -> String {
        format!(
            "Scanned: {}, Archived: {}, Skipped: {}, Degraded: {}, In: {} bytes, Out: {} bytes, Duration: {:?}",
            self.scanned,
            self.entries_written,
            self.skipped,
            self.degraded,
            self.bytes_in,
            self.bytes_out,
            self.duration
        )
    }
}
