//! One open of the device: buffered socket I/O plus its session state
//!
//! The read buffer is allocated once per connection. Frames are decoded
//! straight out of it and replies are staged in a write buffer until the
//! socket accepts them.

use std::io::{self, Read, Write};

use mio::net::UnixStream;

use crate::protocol::{HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::service::SessionState;

/// Room for several maximal frames.
const READ_BUFFER_SIZE: usize = 64 * 1024;
/// Replies beyond this are a client that stopped reading.
const MAX_PENDING_WRITE: usize = 1024 * 1024;

const _: () = assert!(READ_BUFFER_SIZE >= HEADER_SIZE + MAX_PAYLOAD_SIZE);

/// Result of draining the socket into the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// Socket would block; wait for the next readiness event.
    Drained,
    /// Buffer filled up before the socket drained; process and read again.
    Full,
    /// Peer closed its end.
    Closed,
}

pub struct Connection {
    stream: UnixStream,
    session: SessionState,
    read_buffer: Box<[u8]>,
    write_buffer: Vec<u8>,
    read_pos: usize,
    read_len: usize,
    // Payload bytes of a rejected oversize write still to be skipped
    discard: usize,
}

impl Connection {
    pub fn new(stream: UnixStream, session: SessionState) -> Self {
        Self {
            stream,
            session,
            read_buffer: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            write_buffer: Vec::new(),
            read_pos: 0,
            read_len: 0,
            discard: 0,
        }
    }

    /// Read everything the socket has, up to the buffer size.
    pub fn fill_read_buffer(&mut self) -> io::Result<FillStatus> {
        // Compact buffer
        if self.read_pos > 0 {
            self.read_buffer.copy_within(self.read_pos..self.read_len, 0);
            self.read_len -= self.read_pos;
            self.read_pos = 0;
        }

        loop {
            if self.read_len == self.read_buffer.len() {
                return Ok(FillStatus::Full);
            }

            match self.stream.read(&mut self.read_buffer[self.read_len..]) {
                Ok(0) => return Ok(FillStatus::Closed),
                Ok(n) => self.read_len += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(FillStatus::Drained)
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Unconsumed input together with the session, borrowed disjointly so
    /// frames can be decoded while the session is updated.
    #[inline(always)]
    pub fn input_and_session(&mut self) -> (&[u8], &mut SessionState) {
        (
            &self.read_buffer[self.read_pos..self.read_len],
            &mut self.session,
        )
    }

    #[inline(always)]
    pub fn consume(&mut self, n: usize) {
        self.read_pos += n.min(self.read_len - self.read_pos);
    }

    /// Skip the next `n` bytes of the stream, including bytes not yet read.
    pub fn discard(&mut self, n: usize) {
        self.discard += n;
        self.discard_pending();
    }

    /// Drop buffered input owed to an earlier [`discard`](Self::discard).
    pub fn discard_pending(&mut self) {
        let skip = self.discard.min(self.read_len - self.read_pos);
        self.read_pos += skip;
        self.discard -= skip;
    }

    #[inline(always)]
    pub fn is_discarding(&self) -> bool {
        self.discard > 0
    }

    /// Stage reply bytes and try to send them.
    pub fn queue_write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.write_buffer.len() + data.len() > MAX_PENDING_WRITE {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "peer is not reading replies",
            ));
        }

        self.write_buffer.extend_from_slice(data);
        self.flush_write_buffer()
    }

    /// Write as much of the staged replies as the socket takes.
    pub fn flush_write_buffer(&mut self) -> io::Result<()> {
        let mut written = 0;

        while written < self.write_buffer.len() {
            match self.stream.write(&self.write_buffer[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write to socket",
                    ));
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        self.write_buffer.drain(..written);
        Ok(())
    }

    #[inline(always)]
    pub fn write_pending(&self) -> usize {
        self.write_buffer.len()
    }

    pub fn stream_mut(&mut self) -> &mut UnixStream {
        &mut self.stream
    }

    #[inline(always)]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Hand the session back for teardown.
    pub fn into_session(self) -> SessionState {
        self.session
    }
}
