use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::frame::MAX_NAME_LEN;

#[derive(Debug, Error)]
pub enum Error {
    #[error("environment variable {var} is not set")]
    MissingEnv { var: &'static str },
    #[error("unable to access quarantine folder {}: {source}", .path.display())]
    SourceUnavailable { path: PathBuf, source: io::Error },
    #[error("unable to write output file {}: {source}", .path.display())]
    OutputUnavailable { path: PathBuf, source: io::Error },
    #[error("unable to read file {}: {source}", .path.display())]
    ReadSource { path: PathBuf, source: io::Error },
    #[error("unable to allocate memory with size of {bytes} bytes")]
    Alloc { bytes: u64 },
    #[error("file name is {len} bytes, frame names are limited to {max}", max = MAX_NAME_LEN)]
    NameTooLong { len: usize },
    #[error("compressed payload of {len} bytes does not fit the 32-bit length field")]
    PayloadTooLarge { len: usize },
    #[error("compression failed: {0}")]
    Compress(#[source] io::Error),
    #[error("frame for {name} was partially written: {source}")]
    PartialFrame { name: String, source: io::Error },
    #[error("unable to flush output archive: {0}")]
    Sync(#[source] io::Error),
    #[error("archive writer is unusable after a partial frame")]
    Poisoned,
    #[error("archive ends inside a frame: {0}")]
    Truncated(&'static str),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether the error ends the whole run rather than skipping one entry.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::ReadSource { .. }
                | Error::Alloc { .. }
                | Error::NameTooLong { .. }
                | Error::PayloadTooLarge { .. }
                | Error::Compress(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
