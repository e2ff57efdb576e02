//! Blocking client for the device endpoint
//!
//! Each `Client` is one open of the device: the first successful `read`
//! returns a value and every later read on the same client returns
//! end-of-stream. Reconnect to read again.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use thiserror::Error;

use crate::error::HeapError;
use crate::protocol::{decode_insert, FrameError, FrameHeader, OpCode, HEADER_SIZE, MAX_ENCODED_LEN};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("bad reply frame: {0}")]
    Frame(#[from] FrameError),

    #[error("request rejected: {0}")]
    Rejected(HeapError),

    #[error("request rejected with unknown status {status}: {message}")]
    UnknownStatus { status: u8, message: String },

    #[error("unexpected reply {0:?}")]
    UnexpectedReply(OpCode),

    #[error("server returned a non-integer value")]
    BadValue,
}

pub struct Client {
    stream: UnixStream,
}

impl Client {
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path)?;
        Ok(Self { stream })
    }

    /// Send a raw write payload, as `echo <payload> > device` would.
    pub fn write(&mut self, payload: &[u8]) -> Result<(), ClientError> {
        let (header, _) = self.request(OpCode::Write, payload)?;
        expect_op(header, OpCode::Ack)
    }

    pub fn insert(&mut self, value: i32) -> Result<(), ClientError> {
        self.write(value.to_string().as_bytes())
    }

    pub fn clear(&mut self) -> Result<(), ClientError> {
        let (header, _) = self.request(OpCode::Clear, &[])?;
        expect_op(header, OpCode::Ack)
    }

    /// Raw read: `"<value>\n"`, or empty at end-of-stream.
    pub fn read(&mut self) -> Result<Vec<u8>, ClientError> {
        let (header, data) = self.request(OpCode::Read, &[])?;
        expect_op(header, OpCode::Data)?;
        Ok(data)
    }

    /// Read and parse one value. `None` at end-of-stream.
    pub fn extract(&mut self) -> Result<Option<i32>, ClientError> {
        let data = self.read()?;
        if data.is_empty() {
            return Ok(None);
        }
        decode_insert(&data, MAX_ENCODED_LEN + 1)
            .map(Some)
            .map_err(|_| ClientError::BadValue)
    }

    fn request(&mut self, op: OpCode, payload: &[u8]) -> Result<(FrameHeader, Vec<u8>), ClientError> {
        let payload_len = u32::try_from(payload.len()).map_err(|_| {
            ClientError::Rejected(HeapError::InputTooLarge {
                len: payload.len(),
                max: u32::MAX as usize,
            })
        })?;
        let header = FrameHeader::new(op, 0, payload_len);
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(payload);
        self.stream.write_all(&frame)?;

        let mut raw = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut raw)?;
        let reply = FrameHeader::parse(&raw)?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "short reply header")
        })?;

        if reply.is_oversize() {
            return Err(ClientError::UnexpectedReply(reply.op));
        }
        let mut data = vec![0u8; reply.payload_len as usize];
        self.stream.read_exact(&mut data)?;

        if reply.op == OpCode::Error {
            return Err(match HeapError::from_code(reply.status) {
                Some(err) => ClientError::Rejected(err),
                None => ClientError::UnknownStatus {
                    status: reply.status,
                    message: String::from_utf8_lossy(&data).into_owned(),
                },
            });
        }

        Ok((reply, data))
    }
}

fn expect_op(header: FrameHeader, op: OpCode) -> Result<(), ClientError> {
    if header.op == op {
        Ok(())
    } else {
        Err(ClientError::UnexpectedReply(header.op))
    }
}
