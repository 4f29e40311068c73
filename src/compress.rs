//! Per-entry gzip compression.
//!
//! Every quarantine file is compressed on its own with a gzip wrapper at the
//! highest deflate level. The gzip header carries mtime 0 and no filename, so
//! the same input always produces the same payload bytes.

use std::io::Write;

use flate2::{Compression, GzBuilder};

use crate::error::{Error, Result};

/// Fixed gzip wrapper cost: 10-byte header plus CRC32 and ISIZE trailer.
pub const GZIP_WRAPPER_LEN: usize = 18;

/// Worst-case gzip output size for `raw_len` input bytes.
///
/// zlib's `compressBound` plus the gzip wrapper. Incompressible input falls
/// back to stored blocks, which always fit inside this bound.
pub fn gzip_bound(raw_len: usize) -> usize {
    raw_len
        .saturating_add(raw_len >> 12)
        .saturating_add(raw_len >> 14)
        .saturating_add(raw_len >> 25)
        .saturating_add(13)
        .saturating_add(GZIP_WRAPPER_LEN)
}

/// Compressed bytes for one entry, together with the capacity reserved for them.
#[derive(Debug, Clone)]
pub struct CompressedPayload {
    bytes: Vec<u8>,
    capacity: usize,
}

impl CompressedPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Compressed length actually produced.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when the output reached the reserved capacity, in which case a
    /// truncated entry cannot be ruled out.
    pub fn possibly_truncated(&self) -> bool {
        self.bytes.len() >= self.capacity.saturating_sub(1)
    }
}

/// Compress `raw` in a single pass at maximum compression.
pub fn compress(raw: &[u8]) -> Result<CompressedPayload> {
    compress_with_capacity(raw, gzip_bound(raw.len()))
}

pub(crate) fn compress_with_capacity(raw: &[u8], capacity: usize) -> Result<CompressedPayload> {
    let mut out = Vec::new();
    out.try_reserve_exact(capacity).map_err(|_| Error::Alloc {
        bytes: capacity as u64,
    })?;

    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(out, Compression::best());
    encoder.write_all(raw).map_err(Error::Compress)?;
    let bytes = encoder.finish().map_err(Error::Compress)?;

    Ok(CompressedPayload { bytes, capacity })
}
