//! Device endpoint with event-driven I/O
//!
//! A single mio `Poll` loop accepts connections on a Unix socket and
//! answers framed device operations. Each accepted connection is one open
//! of the device; the heap itself is shared through the `Service`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::net::UnixListener;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, info, warn};

use super::connection::{Connection, FillStatus};
use crate::protocol::{Decoder, Encoder, Frame, OpCode};
use crate::service::{Response, Service};

const LISTENER_TOKEN: Token = Token(0);
const WAKER_TOKEN: Token = Token(1);
const FIRST_CONNECTION_TOKEN: usize = 2;
const MAX_CONNECTIONS: usize = 1024;
const EVENTS_CAPACITY: usize = 1024;
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Stops a running [`Server`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> io::Result<()> {
        self.flag.store(true, Ordering::Release);
        self.waker.wake()
    }
}

/// Device server
pub struct Server {
    poll: Poll,
    listener: UnixListener,
    path: PathBuf,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    service: Arc<Service>,
    // Reused for every reply batch
    encoder: Encoder,
    shutdown: Arc<AtomicBool>,
    waker: Arc<Waker>,
    stats_interval: Option<Duration>,
}

impl Server {
    /// Bind the device socket at `path`.
    ///
    /// A stale socket file left by a previous run is replaced; any other
    /// existing file is an error.
    pub fn bind(path: impl AsRef<Path>, service: Arc<Service>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        remove_stale_socket(&path)?;

        let poll = Poll::new()?;
        let mut listener = UnixListener::bind(&path)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        info!(
            path = %path.display(),
            capacity = service.config().capacity,
            buffer_size = service.config().buffer_size,
            "device registered"
        );

        Ok(Self {
            poll,
            listener,
            path,
            connections: HashMap::with_capacity(64),
            next_token: FIRST_CONNECTION_TOKEN,
            service,
            encoder: Encoder::new(4096),
            shutdown: Arc::new(AtomicBool::new(false)),
            waker,
            stats_interval: None,
        })
    }

    /// Log service counters every `interval`.
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = Some(interval);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            waker: Arc::clone(&self.waker),
        }
    }

    /// Run the event loop until a [`ShutdownHandle`] fires.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        let mut last_stats = Instant::now();

        while !self.shutdown.load(Ordering::Acquire) {
            if let Err(e) = self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => self.accept_connections()?,
                    WAKER_TOKEN => {}
                    token => {
                        let mut open = true;
                        if event.is_readable() || event.is_read_closed() {
                            open = self.handle_read(token);
                        }
                        if open && event.is_writable() {
                            open = self.handle_write(token);
                        }
                        if !open {
                            self.close_connection(token);
                        }
                    }
                }
            }

            if let Some(interval) = self.stats_interval {
                if last_stats.elapsed() >= interval {
                    self.log_stats();
                    last_stats = Instant::now();
                }
            }
        }

        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.close_connection(token);
        }
        info!("server stopped");
        Ok(())
    }

    fn accept_connections(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, _addr)) => {
                    if self.connections.len() >= MAX_CONNECTIONS {
                        warn!("max connections reached, rejecting open");
                        continue;
                    }

                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if let Err(e) = self.poll.registry().register(
                        &mut stream,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    ) {
                        warn!(?token, error = %e, "register failed, rejecting open");
                        continue;
                    }

                    let session = self.service.open();
                    debug!(session = session.id(), ?token, "connection accepted");
                    self.connections
                        .insert(token, Connection::new(stream, session));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Returns `false` when the connection should be closed.
    fn handle_read(&mut self, token: Token) -> bool {
        let conn = match self.connections.get_mut(&token) {
            Some(c) => c,
            None => return true,
        };

        loop {
            let status = match conn.fill_read_buffer() {
                Ok(status) => status,
                Err(e) => {
                    warn!(?token, error = %e, "read failed");
                    return false;
                }
            };

            if let Err(e) = serve_frames(&self.service, &mut self.encoder, conn) {
                warn!(?token, error = %e, "dropping connection");
                return false;
            }

            match status {
                FillStatus::Full => continue,
                FillStatus::Drained => return true,
                FillStatus::Closed => return false,
            }
        }
    }

    fn handle_write(&mut self, token: Token) -> bool {
        match self.connections.get_mut(&token) {
            Some(conn) => match conn.flush_write_buffer() {
                Ok(()) => true,
                Err(e) => {
                    warn!(?token, error = %e, "write failed");
                    false
                }
            },
            None => true,
        }
    }

    fn close_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
                debug!(?token, error = %e, "deregister failed");
            }
            self.service.close(conn.into_session());
        }
    }

    fn log_stats(&self) {
        let stats = self.service.stats().snapshot();
        info!(
            size = self.service.guard().len(),
            capacity = self.service.guard().capacity(),
            inserts = stats.inserts,
            extracts = stats.extracts,
            clears = stats.clears,
            rejected = stats.rejected,
            empty_reads = stats.empty_reads,
            sessions_active = stats.sessions_active,
            "device stats"
        );
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "socket cleanup failed");
        }
        info!(path = %self.path.display(), "device unregistered");
    }
}

/// Decode every complete frame in the connection's buffer, apply it to the
/// service and queue the replies in request order.
///
/// An oversize write is answered with a rejection and its payload is
/// skipped as it arrives, so the connection stays usable.
fn serve_frames(service: &Service, encoder: &mut Encoder, conn: &mut Connection) -> io::Result<()> {
    encoder.reset();

    loop {
        conn.discard_pending();
        if conn.is_discarding() {
            break;
        }

        let mut skip = 0;
        let consumed = {
            let (input, session) = conn.input_and_session();
            let mut decoder = Decoder::new(input);

            while let Some(frame) = decoder.next()? {
                let (header, payload) = match frame {
                    Frame::Complete(header, payload) => (header, payload),
                    Frame::Oversize(header) => {
                        skip = header.payload_len as usize;
                        encode_response(encoder, service.reject_oversize(skip))?;
                        break;
                    }
                };
                let response = match header.op {
                    OpCode::Write => service.write(session, payload),
                    OpCode::Read => service.read(session),
                    OpCode::Clear => service.clear(),
                    op => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("client sent reply opcode {:?}", op),
                        ));
                    }
                };
                encode_response(encoder, response)?;
            }

            decoder.consumed()
        };

        conn.consume(consumed);
        if skip == 0 {
            break;
        }
        conn.discard(skip);
    }

    if !encoder.is_empty() {
        conn.queue_write(encoder.as_bytes())?;
    }
    Ok(())
}

fn encode_response(encoder: &mut Encoder, response: Response) -> io::Result<()> {
    let encoded = match response {
        Response::Accepted => encoder.encode(OpCode::Ack, 0, &[]),
        Response::Value(_) | Response::Empty(_) => {
            let data = response.read_bytes();
            let bytes = data.as_ref().map_or(&[][..], |d| d.as_bytes());
            encoder.encode(OpCode::Data, 0, bytes)
        }
        Response::Rejected(err) => {
            encoder.encode(OpCode::Error, err.code(), err.to_string().as_bytes())
        }
    };

    match encoded {
        Some(_) => Ok(()),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "reply exceeds frame limit",
        )),
    }
}

/// Clear the way for binding `path`.
///
/// A socket nobody answers on is left over from a dead server and is
/// removed. A socket that accepts a connection belongs to a live server.
fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            if std::os::unix::net::UnixStream::connect(path).is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("{} is served by a running server", path.display()),
                ));
            }
            fs::remove_file(path)
        }
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a socket", path.display()),
        )),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
