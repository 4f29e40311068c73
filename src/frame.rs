//! Archive frame layout.
//!
//! An archive is a bare concatenation of frames with no header, trailer or
//! entry count:
//!
//! ```text
//! name_len    : u8
//! name        : name_len bytes, not null-terminated
//! payload_len : u32, little-endian
//! payload     : payload_len bytes of gzip data
//! ```
//!
//! Readers parse until end of stream, so a frame that is only partly written
//! corrupts every frame boundary after it.

use std::io::{self, Read, Write};

use serde::Serialize;

use crate::error::{Error, Result};

/// Longest name the one-byte length field can describe.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;
/// Longest payload the four-byte length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

const NAME_LEN_FIELD: usize = 1;
const PAYLOAD_LEN_FIELD: usize = 4;

/// Bytes a frame occupies on disk.
pub fn encoded_len(name: &[u8], payload: &[u8]) -> u64 {
    (NAME_LEN_FIELD + name.len() + PAYLOAD_LEN_FIELD) as u64 + payload.len() as u64
}

/// Length byte for `name`, or [`Error::NameTooLong`].
pub(crate) fn check_name(name: &[u8]) -> Result<u8> {
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong { len: name.len() });
    }
    Ok(name.len() as u8)
}

fn check_payload_len(len: usize) -> Result<u32> {
    if len > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge { len });
    }
    Ok(len as u32)
}

fn check_lengths(name: &[u8], payload: &[u8]) -> Result<(u8, u32)> {
    Ok((check_name(name)?, check_payload_len(payload.len())?))
}

/// Append one frame to `out`.
///
/// Lengths are validated before the first byte is written, so a rejected
/// entry leaves the stream untouched. Once writing has started, any failure is
/// reported as [`Error::PartialFrame`].
pub fn write_frame<W: Write + ?Sized>(out: &mut W, name: &[u8], payload: &[u8]) -> Result<u64> {
    let (name_len, payload_len) = check_lengths(name, payload)?;

    let written = out
        .write_all(&[name_len])
        .and_then(|_| out.write_all(name))
        .and_then(|_| out.write_all(&payload_len.to_le_bytes()))
        .and_then(|_| out.write_all(payload));
    if let Err(source) = written {
        return Err(Error::PartialFrame {
            name: String::from_utf8_lossy(name).into_owned(),
            source,
        });
    }

    Ok(encoded_len(name, payload))
}

/// Encode one frame into a fresh buffer.
pub fn encode_frame(name: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    check_lengths(name, payload)?;
    let mut buf = Vec::with_capacity(encoded_len(name, payload) as usize);
    write_frame(&mut buf, name, payload)?;
    Ok(buf)
}

/// One parsed frame. The payload is left compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub name: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn summary(&self) -> FrameSummary {
        FrameSummary {
            name: self.name_lossy(),
            payload_len: self.payload.len() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    pub name: String,
    pub payload_len: u64,
}

/// Sequential frame parser over any byte stream.
pub struct FrameReader<R> {
    inner: R,
    done: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }

    /// Read the next frame, or `None` at a clean end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut name_len = [0u8; NAME_LEN_FIELD];
        match self.inner.read_exact(&mut name_len) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let mut name = vec![0u8; name_len[0] as usize];
        read_field(&mut self.inner, &mut name, "name")?;

        let mut payload_len = [0u8; PAYLOAD_LEN_FIELD];
        read_field(&mut self.inner, &mut payload_len, "payload length")?;
        let payload_len = u32::from_le_bytes(payload_len) as u64;

        let mut payload = Vec::new();
        (&mut self.inner)
            .take(payload_len)
            .read_to_end(&mut payload)?;
        if payload.len() as u64 != payload_len {
            return Err(Error::Truncated("payload"));
        }

        Ok(Some(Frame { name, payload }))
    }

}

fn read_field<R: Read>(inner: &mut R, buf: &mut [u8], field: &'static str) -> Result<()> {
    inner.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated(field)
        } else {
            Error::Io(err)
        }
    })
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_byte_exact() {
        let frame = encode_frame(b"a.nqf", &[0xaa, 0xbb, 0xcc]).expect("encode");
        assert_eq!(
            frame,
            vec![5, b'a', b'.', b'n', b'q', b'f', 3, 0, 0, 0, 0xaa, 0xbb, 0xcc]
        );
        assert_eq!(encoded_len(b"a.nqf", &[0xaa, 0xbb, 0xcc]), 13);
    }

    #[test]
    fn payload_length_is_little_endian() {
        let payload = vec![7u8; 0x0102];
        let frame = encode_frame(b"x", &payload).expect("encode");
        assert_eq!(&frame[2..6], &[0x02, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn name_of_255_bytes_is_accepted() {
        let name = vec![b'n'; MAX_NAME_LEN];
        let frame = encode_frame(&name, b"p").expect("encode");
        assert_eq!(frame[0], 255);
    }

    #[test]
    fn name_of_256_bytes_writes_nothing() {
        let name = vec![b'n'; MAX_NAME_LEN + 1];
        let mut out = Vec::new();
        let err = write_frame(&mut out, &name, b"p").unwrap_err();
        assert!(matches!(err, Error::NameTooLong { len: 256 }));
        assert!(out.is_empty());
    }

    #[test]
    fn payload_length_field_limit() {
        assert_eq!(check_payload_len(MAX_PAYLOAD_LEN).expect("fits"), u32::MAX);
        assert_eq!(check_payload_len(0).expect("fits"), 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn payload_over_field_limit_is_recoverable() {
        let err = check_payload_len(MAX_PAYLOAD_LEN + 1).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { len } if len == MAX_PAYLOAD_LEN + 1));
        assert!(!err.is_fatal());
    }

    #[test]
    fn rejected_name_does_not_corrupt_following_frames() {
        let mut out = Vec::new();
        write_frame(&mut out, b"first.ndf", b"one").expect("first");
        write_frame(&mut out, &[b'z'; 256], b"dropped").unwrap_err();
        write_frame(&mut out, b"second.nqf", b"two").expect("second");

        let frames: Vec<Frame> = FrameReader::new(out.as_slice())
            .collect::<Result<_>>()
            .expect("parse");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].name, b"first.ndf");
        assert_eq!(frames[1].name, b"second.nqf");
        assert_eq!(frames[1].payload, b"two");
    }

    #[test]
    fn empty_stream_has_no_frames() {
        let mut reader = FrameReader::new(&[][..]);
        assert!(reader.read_frame().expect("read").is_none());
    }

    #[test]
    fn short_payload_is_truncated() {
        let mut frame = encode_frame(b"a.nqf", b"payload").expect("encode");
        frame.truncate(frame.len() - 2);
        let mut reader = FrameReader::new(frame.as_slice());
        assert!(matches!(reader.next(), Some(Err(Error::Truncated("payload")))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn short_length_field_is_truncated() {
        let frame = encode_frame(b"a.nqf", b"payload").expect("encode");
        let mut reader = FrameReader::new(&frame[..8]);
        assert!(matches!(
            reader.read_frame(),
            Err(Error::Truncated("payload length"))
        ));
    }

    struct FailAfter {
        budget: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "device full"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failure_mid_frame_is_partial() {
        let mut sink = FailAfter { budget: 3 };
        let err = write_frame(&mut sink, b"a.nqf", b"payload").unwrap_err();
        assert!(matches!(err, Error::PartialFrame { ref name, .. } if name == "a.nqf"));
        assert!(err.is_fatal());
    }
}
