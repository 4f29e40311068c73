//! Default locations and archive naming.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// File name prefix of every archive.
pub const DEFAULT_PREFIX: &str = "Nod32MalPack";
pub const ARCHIVE_EXTENSION: &str = "bin";

const QUARANTINE_ENV: &str = "LOCALAPPDATA";
const QUARANTINE_SUBPATH: [&str; 3] = ["ESET", "ESET Security", "Quarantine"];
const OUTPUT_ENV: &str = "USERPROFILE";
const OUTPUT_SUBPATH: &str = "Desktop";

#[derive(Debug, Clone)]
pub struct PackConfig {
    /// Directory scanned for quarantine files.
    pub source_dir: PathBuf,
    /// Directory receiving the archive, usually on portable media.
    pub output_dir: PathBuf,
    pub prefix: String,
}

impl PackConfig {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Resolve both locations from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var_os(var))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&'static str) -> Option<OsString>,
    {
        Ok(Self::new(quarantine_dir(&lookup)?, desktop_dir(&lookup)?))
    }

    /// `<prefix>_<timestamp>.bin`
    pub fn output_file_name(&self, unix_timestamp: i64) -> String {
        format!("{}_{}.{}", self.prefix, unix_timestamp, ARCHIVE_EXTENSION)
    }

    pub fn output_path(&self, unix_timestamp: i64) -> PathBuf {
        self.output_dir.join(self.output_file_name(unix_timestamp))
    }
}

/// The antivirus quarantine folder under the local application data root.
pub fn quarantine_dir<F>(lookup: F) -> Result<PathBuf>
where
    F: Fn(&'static str) -> Option<OsString>,
{
    let root = env_dir(&lookup, QUARANTINE_ENV)?;
    Ok(QUARANTINE_SUBPATH
        .iter()
        .fold(root, |path, part| path.join(part)))
}

/// The user's desktop, where the archive is dropped by default.
pub fn desktop_dir<F>(lookup: F) -> Result<PathBuf>
where
    F: Fn(&'static str) -> Option<OsString>,
{
    Ok(env_dir(&lookup, OUTPUT_ENV)?.join(OUTPUT_SUBPATH))
}

fn env_dir<F>(lookup: &F, var: &'static str) -> Result<PathBuf>
where
    F: Fn(&'static str) -> Option<OsString>,
{
    match lookup(var) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => Err(Error::MissingEnv { var }),
    }
}
