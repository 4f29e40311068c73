//! Quarantine directory enumeration.

use std::ffi::{OsStr, OsString};
use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Suffixes of the files the antivirus product keeps in quarantine: `.nqf`
/// holds the sample, `.ndf` its detection record.
pub const QUARANTINE_EXTENSIONS: [&[u8]; 2] = [b".nqf", b".ndf"];

const EXTENSION_LEN: usize = 4;

/// A candidate source file found during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineEntry {
    pub path: PathBuf,
    pub file_name: OsString,
    pub raw_size: u64,
}

impl QuarantineEntry {
    /// Name exactly as it will be stored in the archive frame.
    pub fn name_bytes(&self) -> &[u8] {
        self.file_name.as_encoded_bytes()
    }

    pub fn display_name(&self) -> String {
        self.file_name.to_string_lossy().into_owned()
    }
}

/// Case-insensitive suffix match. A bare `.nqf` is not a candidate.
pub fn is_quarantine_file(name: &OsStr) -> bool {
    let bytes = name.as_encoded_bytes();
    if bytes.len() <= EXTENSION_LEN {
        return false;
    }
    let suffix = &bytes[bytes.len() - EXTENSION_LEN..];
    QUARANTINE_EXTENSIONS
        .iter()
        .any(|ext| suffix.eq_ignore_ascii_case(ext))
}

/// Open `dir` for scanning. Failure to list it is fatal for the run.
pub fn scan(dir: &Path) -> Result<QuarantineScan> {
    let entries = fs::read_dir(dir).map_err(|source| Error::SourceUnavailable {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(QuarantineScan {
        dir: dir.to_path_buf(),
        entries,
    })
}

/// Lazily yields quarantine files in directory order.
///
/// Files with other suffixes are never opened or stat'ed. Directories are
/// ignored; symlinks are followed, and a dangling one surfaces as an error for
/// that entry only.
pub struct QuarantineScan {
    dir: PathBuf,
    entries: ReadDir,
}

fn candidate(entry: fs::DirEntry) -> Option<Result<QuarantineEntry>> {
    let file_name = entry.file_name();
    if !is_quarantine_file(&file_name) {
        return None;
    }
    let path = entry.path();

    let file_type = match entry.file_type() {
        Ok(file_type) => file_type,
        Err(source) => return Some(Err(Error::ReadSource { path, source })),
    };
    if file_type.is_dir() {
        return None;
    }

    // fs::metadata follows symlinks; DirEntry::metadata does not.
    let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        Err(source) => return Some(Err(Error::ReadSource { path, source })),
    };
    if !metadata.is_file() {
        return None;
    }

    Some(Ok(QuarantineEntry {
        path,
        file_name,
        raw_size: metadata.len(),
    }))
}

impl Iterator for QuarantineScan {
    type Item = Result<QuarantineEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(source) => {
                    return Some(Err(Error::ReadSource {
                        path: self.dir.clone(),
                        source,
                    }))
                }
            };
            if let Some(candidate) = candidate(entry) {
                return Some(candidate);
            }
        }
    }
}
