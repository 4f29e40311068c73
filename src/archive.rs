//! Archive construction.
//!
//! [`run`] walks the quarantine directory and appends one frame per sample to
//! a freshly created archive. Entry-level problems skip that entry and flag
//! the run; stream-level problems abort it.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{error, info, warn};

use crate::cleanup::PendingDeletions;
use crate::compress::{compress, CompressedPayload};
use crate::error::{Error, Result};
use crate::frame::{check_name, write_frame};
use crate::report::RunReport;
use crate::scan::{scan, QuarantineEntry};

/// What a finished run hands to cleanup.
#[derive(Debug)]
pub struct ArchiveRun {
    pub report: RunReport,
    pub pending: PendingDeletions,
}

impl ArchiveRun {
    pub fn into_parts(self) -> (RunReport, PendingDeletions) {
        (self.report, self.pending)
    }
}

/// Appends frames to an exclusively owned sink.
///
/// After a fatal error the sink may end inside a frame, so the writer refuses
/// any further appends.
pub struct ArchiveWriter<W: Write> {
    out: W,
    report: RunReport,
    pending: PendingDeletions,
    poisoned: bool,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            report: RunReport::new(),
            pending: PendingDeletions::new(),
            poisoned: false,
        }
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn pending(&self) -> &PendingDeletions {
        &self.pending
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Compress `raw` and append it as a frame named `name`.
    ///
    /// Recoverable errors leave the sink untouched and the writer usable.
    /// Returns the number of bytes appended.
    pub fn append(&mut self, name: &[u8], raw: &[u8]) -> Result<u64> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        check_name(name)?;

        let payload = compress(raw)?;
        self.append_payload(name, raw.len() as u64, &payload)
    }

    /// Append an already compressed payload of `raw_len` source bytes.
    pub(crate) fn append_payload(
        &mut self,
        name: &[u8],
        raw_len: u64,
        payload: &CompressedPayload,
    ) -> Result<u64> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        let display = String::from_utf8_lossy(name);

        let frame_len = match write_frame(&mut self.out, name, payload.as_bytes()) {
            Ok(len) => len,
            Err(err) => {
                self.poisoned = err.is_fatal();
                return Err(err);
            }
        };
        if let Err(source) = self.out.flush() {
            self.poisoned = true;
            return Err(Error::PartialFrame {
                name: display.into_owned(),
                source,
            });
        }

        // A suspect entry stays in the archive; the flag keeps sources on disk.
        if payload.possibly_truncated() {
            warn!("Archive entry for file {display} may be incomplete.");
            self.report
                .record_degraded(format!("archive entry for file {display} may be incomplete"));
        }
        self.report.record_written(raw_len, frame_len);
        Ok(frame_len)
    }

    /// Read, compress and append one scanned file.
    ///
    /// Only fatal errors are returned; anything else is logged, recorded on
    /// the report and the file is skipped. The path is queued for deletion
    /// once its frame is in the sink.
    pub fn add_entry(&mut self, entry: &QuarantineEntry) -> Result<()> {
        self.report.scanned += 1;

        let appended =
            read_source(&entry.path).and_then(|raw| self.append(entry.name_bytes(), &raw));
        match appended {
            Ok(_) => {
                info!("Successfully archived file {}.", entry.display_name());
                self.pending.push(entry.path.clone());
                Ok(())
            }
            Err(err) if err.is_fatal() => {
                error!("Archiving file {} failed. Aborting...", entry.display_name());
                Err(err)
            }
            Err(err) => {
                self.record_failure(&entry.display_name(), &err);
                Ok(())
            }
        }
    }

    /// Record a recoverable failure for the entry `name` and skip it.
    pub fn record_failure(&mut self, name: &str, err: &Error) {
        let message = format!("Unable to archive file {name}: {err}");
        error!("{message} (file skipped)");
        self.report.record_skipped(message);
    }

    /// Flush the sink and release it with the run outcome.
    pub fn finish(mut self) -> Result<(W, ArchiveRun)> {
        self.out.flush().map_err(Error::Sync)?;
        let run = ArchiveRun {
            report: self.report,
            pending: self.pending,
        };
        Ok((self.out, run))
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    let read_err = |source| Error::ReadSource {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(read_err)?;
    let size = file.metadata().map_err(read_err)?.len();

    let mut raw = Vec::new();
    let capacity = usize::try_from(size).map_err(|_| Error::Alloc { bytes: size })?;
    raw.try_reserve_exact(capacity)
        .map_err(|_| Error::Alloc { bytes: size })?;
    file.read_to_end(&mut raw).map_err(read_err)?;
    Ok(raw)
}

/// Archive every quarantine file in `source_dir` into a new file at
/// `output_path`.
///
/// The output must not exist yet. It is synced to disk before the run is
/// returned, so every path in [`ArchiveRun::pending`] is durably archived.
pub fn run(source_dir: &Path, output_path: &Path) -> Result<ArchiveRun> {
    let start = Instant::now();
    let candidates = scan(source_dir)?;

    let output = open_output(output_path)?;
    info!("Writing output archive to '{}'.", output_path.display());

    let mut writer = ArchiveWriter::new(output);
    for candidate in candidates {
        match candidate {
            Ok(entry) => writer.add_entry(&entry)?,
            Err(err) => {
                writer.report.scanned += 1;
                writer.record_failure(&failed_entry_name(&err), &err);
            }
        }
    }

    let (output, mut run) = writer.finish()?;
    output.sync_all().map_err(Error::Sync)?;
    run.report.duration = start.elapsed();
    Ok(run)
}

/// Best name for an entry the scan could not turn into a candidate.
fn failed_entry_name(err: &Error) -> String {
    match err {
        Error::ReadSource { path, .. } => path
            .file_name()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .into_owned(),
        _ => String::from("<unknown>"),
    }
}

fn open_output(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| Error::OutputUnavailable {
            path: PathBuf::from(path),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::cleanup;
    use crate::compress::compress_with_capacity;
    use crate::frame::{Frame, FrameReader, MAX_NAME_LEN};
    use std::io;

    #[test]
    fn append_writes_one_frame_per_entry() {
        let mut writer = ArchiveWriter::new(Vec::new());
        writer.append(b"a.nqf", b"0123456789").expect("a");
        writer.append(b"b.NDF", b"").expect("b");

        let (out, run) = writer.finish().expect("finish");
        assert_eq!(run.report.entries_written, 2);
        assert!(!run.report.had_errors);
        assert_eq!(run.report.bytes_out, out.len() as u64);

        let frames: Vec<Frame> = FrameReader::new(out.as_slice())
            .collect::<Result<_>>()
            .expect("parse");
        assert_eq!(frames[0].name, b"a.nqf");
        assert_eq!(frames[1].name, b"b.NDF");
    }

    #[test]
    fn long_name_is_recoverable() {
        let mut writer = ArchiveWriter::new(Vec::new());
        let err = writer.append(&[b'x'; 256], b"data").unwrap_err();
        assert!(!err.is_fatal());
        assert!(!writer.is_poisoned());
        writer.append(b"after.nqf", b"data").expect("next entry");

        let (out, run) = writer.finish().expect("finish");
        assert_eq!(run.report.entries_written, 1);
        let frames: Vec<Frame> = FrameReader::new(out.as_slice())
            .collect::<Result<_>>()
            .expect("parse");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name, b"after.nqf");
    }

    #[test]
    fn long_name_is_rejected_before_compressing() {
        let mut writer = ArchiveWriter::new(Vec::new());
        let name = vec![b'x'; MAX_NAME_LEN + 1];
        let raw = vec![0u8; 1 << 20];
        let err = writer.append(&name, &raw).unwrap_err();
        assert!(matches!(err, Error::NameTooLong { len } if len == MAX_NAME_LEN + 1));
        assert_eq!(writer.report().bytes_in, 0);
    }

    #[test]
    fn skipped_entry_error_names_the_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.nqf");
        std::fs::write(&path, b"0123456789")?;
        let file_name = format!("{}.nqf", "x".repeat(300));
        let entry = QuarantineEntry {
            path,
            file_name: file_name.clone().into(),
            raw_size: 10,
        };

        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_entry(&entry)?;
        assert_eq!(writer.report().skipped, 1);
        assert!(writer.report().had_errors);
        assert!(writer.pending().is_empty());
        let recorded = &writer.report().errors[0];
        assert!(recorded.contains(&file_name), "recorded error: {recorded}");
        Ok(())
    }

    #[test]
    fn suspect_entry_is_kept_but_blocks_cleanup() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("s.nqf");
        std::fs::write(&source, b"abc")?;

        let payload = compress_with_capacity(b"abc", 4)?;
        assert!(payload.possibly_truncated());

        let mut writer = ArchiveWriter::new(Vec::new());
        writer.append_payload(b"s.nqf", 3, &payload)?;
        assert!(!writer.is_poisoned());

        let (out, run) = writer.finish()?;
        let frames: Vec<Frame> = FrameReader::new(out.as_slice()).collect::<Result<_>>()?;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name, b"s.nqf");
        assert_eq!(frames[0].payload, payload.as_bytes());

        let (report, _) = run.into_parts();
        assert_eq!(report.entries_written, 1);
        assert_eq!(report.degraded, 1);
        assert!(report.had_errors);
        assert!(report.errors[0].contains("s.nqf"));

        let mut pending = PendingDeletions::new();
        pending.push(source.clone());
        let cleaned = cleanup(pending, report.had_errors);
        assert!(cleaned.skipped);
        assert!(cleaned.deleted.is_empty());
        assert!(source.exists());
        Ok(())
    }

    #[test]
    fn add_entry_queues_source_for_deletion() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.nqf");
        std::fs::write(&path, b"0123456789")?;
        let entry = QuarantineEntry {
            path: path.clone(),
            file_name: "a.nqf".into(),
            raw_size: 10,
        };

        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_entry(&entry)?;
        assert_eq!(writer.pending().iter().collect::<Vec<_>>(), vec![path.as_path()]);
        assert_eq!(writer.report().scanned, 1);
        Ok(())
    }

    #[test]
    fn unreadable_entry_is_skipped_and_flagged() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let entry = QuarantineEntry {
            path: dir.path().join("gone.nqf"),
            file_name: "gone.nqf".into(),
            raw_size: 0,
        };

        let mut writer = ArchiveWriter::new(Vec::new());
        writer.add_entry(&entry)?;
        assert!(writer.pending().is_empty());
        assert!(writer.report().had_errors);
        assert_eq!(writer.report().skipped, 1);

        let (out, _) = writer.finish()?;
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn scan_failure_is_named_by_file() {
        let err = Error::ReadSource {
            path: PathBuf::from("/quarantine/d.nqf"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(failed_entry_name(&err), "d.nqf");

        let mut writer = ArchiveWriter::new(Vec::new());
        writer.record_failure(&failed_entry_name(&err), &err);
        assert!(writer.report().errors[0].starts_with("Unable to archive file d.nqf: "));
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "media removed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sink_failure_poisons_the_writer() {
        let mut writer = ArchiveWriter::new(BrokenSink);
        let err = writer.append(b"a.nqf", b"data").unwrap_err();
        assert!(matches!(err, Error::PartialFrame { .. }));
        assert!(writer.is_poisoned());
        assert!(matches!(
            writer.append(b"b.nqf", b"data"),
            Err(Error::Poisoned)
        ));
        assert_eq!(writer.report().entries_written, 0);
    }
}
