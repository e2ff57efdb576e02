//! Text codec for insert payloads and extract responses
//!
//! Inserts arrive as ASCII decimal integers. Extractions leave as the
//! decimal value followed by a newline, written into a fixed buffer.

use std::fmt;
use std::io::Write;

use crate::config::ServiceConfig;
use crate::error::HeapError;

/// `-2147483648\n`
pub const MAX_ENCODED_LEN: usize = 12;

/// Decoded client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Insert(i32),
    Clear,
    ExtractMin,
}

/// Parse an insert payload.
///
/// `buffer_size` includes the terminator byte the driver reserved, so the
/// payload may use at most `buffer_size - 1` bytes. The length check runs
/// before any parsing. One trailing `\n` is tolerated, as `echo` appends it.
pub fn decode_insert(bytes: &[u8], buffer_size: usize) -> Result<i32, HeapError> {
    let max = buffer_size.saturating_sub(1);
    if bytes.len() > max {
        return Err(HeapError::InputTooLarge {
            len: bytes.len(),
            max,
        });
    }

    let digits = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    std::str::from_utf8(digits)
        .ok()
        .and_then(|text| text.parse::<i32>().ok())
        .ok_or(HeapError::MalformedInput)
}

/// Decode a write payload into a request, applying the configured clear
/// sentinel after a successful parse.
pub fn decode_request(bytes: &[u8], config: &ServiceConfig) -> Result<Request, HeapError> {
    let value = decode_insert(bytes, config.buffer_size)?;

    match config.clear_sentinel {
        Some(sentinel) if sentinel == value => Ok(Request::Clear),
        _ => Ok(Request::Insert(value)),
    }
}

/// Encoded extraction: `"<value>\n"` in a stack buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    buf: [u8; MAX_ENCODED_LEN],
    len: usize,
}

impl Encoded {
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for Encoded {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Encoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Encoded")
            .field(&String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

/// Format an extracted value as decimal ASCII plus newline.
pub fn encode_extract(value: i32) -> Encoded {
    let mut buf = [0u8; MAX_ENCODED_LEN];
    let mut cursor = &mut buf[..];
    // Cannot fail: every i32 fits in MAX_ENCODED_LEN.
    let _ = writeln!(cursor, "{}", value);
    let len = MAX_ENCODED_LEN - cursor.len();

    Encoded { buf, len }
}
