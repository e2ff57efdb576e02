//! Device Frame Format
//!
//! Layout:
//! ┌─────────────────────────────────────────────────────┐
//! │ FrameHeader (12 bytes, fixed, little-endian)        │
//! ├─────────────────────────────────────────────────────┤
//! │ Payload (variable, max 4KB)                         │
//! └─────────────────────────────────────────────────────┘
//!
//! One frame carries one device operation: a write payload, a read
//! request, a clear, or the reply to one of those.

use thiserror::Error;

/// Frame operation.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Client write: payload is the raw insert text
    Write = 1,
    /// Client read request, no payload
    Read = 2,
    /// Explicit clear request, no payload
    Clear = 3,
    /// Write or clear accepted
    Ack = 4,
    /// Read reply: `"<value>\n"`, or empty for end-of-stream
    Data = 5,
    /// Request rejected, `status` holds the error code
    Error = 6,
}

impl OpCode {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Write),
            2 => Some(Self::Read),
            3 => Some(Self::Clear),
            4 => Some(Self::Ack),
            5 => Some(Self::Data),
            6 => Some(Self::Error),
            _ => None,
        }
    }
}

pub const HEADER_SIZE: usize = 12;
pub const MAGIC: u32 = 0x4D48_4550; // "MHEP"
pub const VERSION: u8 = 1;
pub const MAX_PAYLOAD_SIZE: usize = 4096;

/// Malformed frame. Any of these ends the connection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("bad frame magic {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown opcode {0}")]
    UnknownOp(u8),

    #[error("payload of {0} bytes exceeds frame limit")]
    PayloadTooLarge(usize),
}

impl From<FrameError> for std::io::Error {
    fn from(err: FrameError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

/// Fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub op: OpCode,
    /// Error code for `OpCode::Error`, zero otherwise
    pub status: u8,
    pub payload_len: u32,
}

impl FrameHeader {
    #[inline(always)]
    pub fn new(op: OpCode, status: u8, payload_len: u32) -> Self {
        Self {
            op,
            status,
            payload_len,
        }
    }

    /// Serialize to the wire layout.
    #[inline(always)]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        buf[4] = VERSION;
        buf[5] = self.op as u8;
        buf[6] = self.status;
        buf[7] = 0; // reserved
        buf[8..12].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    /// Parse and validate a header. `Ok(None)` means more bytes are needed.
    pub fn parse(buf: &[u8]) -> Result<Option<Self>, FrameError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != MAGIC {
            return Err(FrameError::BadMagic(magic));
        }
        if buf[4] != VERSION {
            return Err(FrameError::UnsupportedVersion(buf[4]));
        }
        let op = OpCode::from_u8(buf[5]).ok_or(FrameError::UnknownOp(buf[5]))?;
        let payload_len = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        // An oversize write is a request failure, not a framing error.
        if payload_len as usize > MAX_PAYLOAD_SIZE && op != OpCode::Write {
            return Err(FrameError::PayloadTooLarge(payload_len as usize));
        }

        Ok(Some(Self {
            op,
            status: buf[6],
            payload_len,
        }))
    }

    /// Write whose payload the receiver must skip instead of buffering.
    #[inline(always)]
    pub fn is_oversize(&self) -> bool {
        self.payload_len as usize > MAX_PAYLOAD_SIZE
    }

    /// Total frame size (header + payload)
    #[inline(always)]
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.payload_len as usize
    }
}

/// Reusable output buffer for frames.
///
/// Allocated once; `reset` between batches.
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Append one frame.
    ///
    /// Returns the encoded frame, or `None` if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn encode(&mut self, op: OpCode, status: u8, payload: &[u8]) -> Option<&[u8]> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return None;
        }

        let start = self.buffer.len();
        let header = FrameHeader::new(op, status, payload.len() as u32);
        self.buffer.extend_from_slice(&header.to_bytes());
        self.buffer.extend_from_slice(payload);

        Some(&self.buffer[start..])
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// One decoded unit of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Header plus its whole payload.
    Complete(FrameHeader, &'a [u8]),
    /// Oversize write: only the header was consumed. The next
    /// `payload_len` bytes of the stream belong to it and must be skipped.
    Oversize(FrameHeader),
}

/// Zero-copy frame decoder over a byte slice.
pub struct Decoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> Decoder<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    /// Decode the next frame.
    ///
    /// `Ok(None)` when the remaining bytes hold only a partial frame.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Frame<'a>>, FrameError> {
        let rest = &self.buffer[self.read_pos..];
        let header = match FrameHeader::parse(rest)? {
            Some(header) => header,
            None => return Ok(None),
        };

        if header.is_oversize() {
            self.read_pos += HEADER_SIZE;
            return Ok(Some(Frame::Oversize(header)));
        }

        if rest.len() < header.total_size() {
            return Ok(None);
        }

        let payload = &rest[HEADER_SIZE..header.total_size()];
        self.read_pos += header.total_size();

        Ok(Some(Frame::Complete(header, payload)))
    }

    /// Bytes consumed by complete frames so far.
    #[inline(always)]
    pub fn consumed(&self) -> usize {
        self.read_pos
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let bytes = FrameHeader::new(OpCode::Error, 3, 7).to_bytes();

        assert_eq!(&bytes[0..4], &MAGIC.to_le_bytes());
        assert_eq!(bytes[4], VERSION);
        assert_eq!(bytes[5], 6);
        assert_eq!(bytes[6], 3);
        assert_eq!(&bytes[8..12], &7u32.to_le_bytes());
    }

    #[test]
    fn test_decode_sequence() {
        let mut encoder = Encoder::new(256);
        encoder.encode(OpCode::Write, 0, b"17").unwrap();
        encoder.encode(OpCode::Read, 0, &[]).unwrap();
        encoder.encode(OpCode::Clear, 0, &[]).unwrap();

        let mut decoder = Decoder::new(encoder.as_bytes());

        let Some(Frame::Complete(header, payload)) = decoder.next().unwrap() else {
            panic!("expected a write frame");
        };
        assert_eq!(header.op, OpCode::Write);
        assert_eq!(payload, b"17");

        let Some(Frame::Complete(header, payload)) = decoder.next().unwrap() else {
            panic!("expected a read frame");
        };
        assert_eq!(header.op, OpCode::Read);
        assert!(payload.is_empty());

        let Some(Frame::Complete(header, _)) = decoder.next().unwrap() else {
            panic!("expected a clear frame");
        };
        assert_eq!(header.op, OpCode::Clear);

        assert_eq!(decoder.next(), Ok(None));
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn test_partial_frame_waits() {
        let mut encoder = Encoder::new(64);
        encoder.encode(OpCode::Write, 0, b"12345").unwrap();
        let bytes = encoder.as_bytes();

        for cut in [0, 5, HEADER_SIZE, bytes.len() - 1] {
            let mut decoder = Decoder::new(&bytes[..cut]);
            assert_eq!(decoder.next(), Ok(None));
            assert_eq!(decoder.consumed(), 0);
        }
    }

    #[test]
    fn test_rejects_corrupt_header() {
        let mut bytes = FrameHeader::new(OpCode::Read, 0, 0).to_bytes();
        bytes[0] ^= 0xFF;
        assert!(matches!(
            FrameHeader::parse(&bytes),
            Err(FrameError::BadMagic(_))
        ));

        let mut bytes = FrameHeader::new(OpCode::Read, 0, 0).to_bytes();
        bytes[4] = 9;
        assert_eq!(
            FrameHeader::parse(&bytes),
            Err(FrameError::UnsupportedVersion(9))
        );

        let mut bytes = FrameHeader::new(OpCode::Read, 0, 0).to_bytes();
        bytes[5] = 42;
        assert_eq!(FrameHeader::parse(&bytes), Err(FrameError::UnknownOp(42)));

        let bytes = FrameHeader::new(OpCode::Read, 0, 1 << 20).to_bytes();
        assert_eq!(
            FrameHeader::parse(&bytes),
            Err(FrameError::PayloadTooLarge(1 << 20))
        );
    }

    #[test]
    fn test_oversize_write_yields_header_only() {
        let mut bytes = FrameHeader::new(OpCode::Write, 0, 5000).to_bytes().to_vec();
        bytes.extend_from_slice(&[b'1'; 100]);

        let mut decoder = Decoder::new(&bytes);
        let frame = decoder.next().unwrap();
        assert_eq!(
            frame,
            Some(Frame::Oversize(FrameHeader::new(OpCode::Write, 0, 5000)))
        );
        // Only the header is consumed; the payload bytes are left to skip.
        assert_eq!(decoder.consumed(), HEADER_SIZE);
    }

    #[test]
    fn test_encoder_rejects_oversize_payload() {
        let mut encoder = Encoder::new(16);
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(encoder.encode(OpCode::Write, 0, &payload).is_none());
        assert!(encoder.is_empty());
    }
}
