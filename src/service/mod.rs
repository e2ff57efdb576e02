//! Service Layer: insert/extract requests against the shared heap
//!
//! The transport hands the service raw write payloads and read requests,
//! each tied to the `SessionState` of the connection it arrived on.
//!
//! Flow:
//! - write: codec → `Request::Insert` / `Request::Clear` → guard
//! - read: session check → guard → codec

mod session;

pub use session::SessionState;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::core::Guard;
use crate::error::{ConfigError, HeapError};
use crate::protocol::{decode_request, encode_extract, Encoded, Request};

/// Why a read produced no data. Both encode to zero bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// Nothing queued.
    HeapEmpty,
    /// This open already delivered its value.
    AlreadyConsumed,
}

/// Outcome of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Accepted,
    Value(i32),
    Empty(EmptyReason),
    Rejected(HeapError),
}

impl Response {
    /// Bytes a read returns: the encoded value, or `None` for end-of-stream.
    pub fn read_bytes(&self) -> Option<Encoded> {
        match self {
            Self::Value(v) => Some(encode_extract(*v)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Service counters
#[derive(Debug, Default)]
pub struct ServiceStats {
    inserts: AtomicU64,
    extracts: AtomicU64,
    clears: AtomicU64,
    rejected: AtomicU64,
    empty_reads: AtomicU64,
    sessions_opened: AtomicU64,
    sessions_active: AtomicU64,
}

/// Point-in-time copy of [`ServiceStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub inserts: u64,
    pub extracts: u64,
    pub clears: u64,
    pub rejected: u64,
    pub empty_reads: u64,
    pub sessions_opened: u64,
    pub sessions_active: u64,
}

impl ServiceStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            extracts: self.extracts.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            empty_reads: self.empty_reads.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
        }
    }
}

/// Min-priority queue service.
///
/// Cheap to share: wrap in `Arc` and hand one to each transport thread.
pub struct Service {
    guard: Arc<Guard>,
    config: ServiceConfig,
    stats: ServiceStats,
}

impl Service {
    /// Build a service over an existing heap.
    ///
    /// The heap's capacity must match `config.capacity`.
    pub fn new(guard: Arc<Guard>, config: ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if guard.capacity() != config.capacity {
            return Err(ConfigError::CapacityMismatch {
                config: config.capacity,
                heap: guard.capacity(),
            });
        }

        Ok(Self {
            guard,
            config,
            stats: ServiceStats::default(),
        })
    }

    /// Build a service with a fresh heap sized from `config`.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(Arc::new(Guard::with_capacity(config.capacity)), config)
    }

    #[inline(always)]
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    #[inline(always)]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[inline(always)]
    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    /// Start a new logical connection.
    pub fn open(&self) -> SessionState {
        let session = SessionState::new();
        self.stats.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.stats.sessions_active.fetch_add(1, Ordering::Relaxed);
        info!(session = session.id(), "device opened");
        session
    }

    /// Tear down a connection, discarding its session.
    pub fn close(&self, session: SessionState) {
        self.stats.sessions_active.fetch_sub(1, Ordering::Relaxed);
        info!(session = session.id(), "device closed");
    }

    /// Decode a write payload with this service's limits.
    pub fn decode(&self, payload: &[u8]) -> Result<Request, HeapError> {
        let request = decode_request(payload, &self.config);
        match &request {
            Ok(Request::Clear) => warn!("clear sentinel received"),
            Err(err) => warn!(len = payload.len(), %err, "write payload rejected"),
            Ok(_) => {}
        }
        request
    }

    /// Apply a decoded request.
    pub fn handle(&self, session: &mut SessionState, request: Request) -> Response {
        match request {
            Request::Insert(value) => self.insert(value),
            Request::Clear => self.clear(),
            Request::ExtractMin => self.read(session),
        }
    }

    /// Handle a raw write payload arriving on `session`.
    pub fn write(&self, session: &mut SessionState, payload: &[u8]) -> Response {
        match self.decode(payload) {
            Ok(request) => self.handle(session, request),
            Err(err) => self.reject(err),
        }
    }

    /// Reject a write whose payload of `len` bytes the transport would not
    /// buffer. The heap is not touched.
    pub fn reject_oversize(&self, len: usize) -> Response {
        let err = HeapError::InputTooLarge {
            len,
            max: self.config.max_payload(),
        };
        warn!(len, %err, "write payload rejected");
        self.reject(err)
    }

    pub fn insert(&self, value: i32) -> Response {
        match self.guard.insert(value) {
            Ok(_) => {
                self.stats.inserts.fetch_add(1, Ordering::Relaxed);
                Response::Accepted
            }
            Err(err) => self.reject(err),
        }
    }

    pub fn clear(&self) -> Response {
        self.guard.clear();
        self.stats.clears.fetch_add(1, Ordering::Relaxed);
        Response::Accepted
    }

    /// One-shot read for this open.
    pub fn read(&self, session: &mut SessionState) -> Response {
        if session.is_consumed() {
            self.stats.empty_reads.fetch_add(1, Ordering::Relaxed);
            return Response::Empty(EmptyReason::AlreadyConsumed);
        }

        match self.guard.extract_min() {
            Ok(value) => {
                session.mark_consumed();
                self.stats.extracts.fetch_add(1, Ordering::Relaxed);
                Response::Value(value)
            }
            Err(_) => {
                self.stats.empty_reads.fetch_add(1, Ordering::Relaxed);
                Response::Empty(EmptyReason::HeapEmpty)
            }
        }
    }

    fn reject(&self, err: HeapError) -> Response {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        Response::Rejected(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(capacity: usize) -> Service {
        Service::from_config(ServiceConfig::default().with_capacity(capacity)).unwrap()
    }

    #[test]
    fn test_first_read_returns_minimum_then_eof() {
        let svc = service(8);
        for v in [9, 4, 6] {
            assert_eq!(svc.insert(v), Response::Accepted);
        }

        let mut session = svc.open();
        assert_eq!(svc.read(&mut session), Response::Value(4));
        assert_eq!(
            svc.read(&mut session),
            Response::Empty(EmptyReason::AlreadyConsumed)
        );
        // The consumed open never touched the heap.
        assert_eq!(svc.guard().len(), 2);

        let mut reopened = svc.open();
        assert_eq!(svc.read(&mut reopened), Response::Value(6));
    }

    #[test]
    fn test_empty_read_does_not_consume() {
        let svc = service(4);
        let mut session = svc.open();

        assert_eq!(
            svc.read(&mut session),
            Response::Empty(EmptyReason::HeapEmpty)
        );
        assert!(!session.is_consumed());

        svc.insert(3);
        assert_eq!(svc.read(&mut session), Response::Value(3));
        assert!(session.is_consumed());
    }

    #[test]
    fn test_write_paths() {
        let svc = service(2);
        let mut session = svc.open();

        assert_eq!(svc.write(&mut session, b"10\n"), Response::Accepted);
        assert_eq!(
            svc.write(&mut session, b"ten"),
            Response::Rejected(HeapError::MalformedInput)
        );
        assert_eq!(svc.write(&mut session, b"-1"), Response::Accepted);
        assert_eq!(
            svc.write(&mut session, b"5"),
            Response::Rejected(HeapError::CapacityExceeded { capacity: 2 })
        );
        assert_eq!(svc.guard().len(), 2);

        let stats = svc.stats().snapshot();
        assert_eq!(stats.inserts, 2);
        assert_eq!(stats.rejected, 2);
    }

    #[test]
    fn test_oversize_write_rejected() {
        let svc = Service::from_config(ServiceConfig::legacy_sentinel()).unwrap();
        let payload = [b'1'; 32];
        let mut session = svc.open();

        assert_eq!(
            svc.write(&mut session, &payload),
            Response::Rejected(HeapError::InputTooLarge { len: 32, max: 31 })
        );
        assert!(svc.guard().is_empty());
    }

    #[test]
    fn test_reject_oversize_counts_and_keeps_heap() {
        let svc = service(4);
        svc.insert(7);

        assert_eq!(
            svc.reject_oversize(100_000),
            Response::Rejected(HeapError::InputTooLarge {
                len: 100_000,
                max: 255
            })
        );
        assert_eq!(svc.guard().len(), 1);
        assert_eq!(svc.stats().snapshot().rejected, 1);
    }

    #[test]
    fn test_sentinel_clears() {
        let svc = Service::from_config(ServiceConfig::legacy_sentinel()).unwrap();
        let mut session = svc.open();
        svc.write(&mut session, b"7");
        svc.write(&mut session, b"3");

        assert_eq!(svc.write(&mut session, b"-1"), Response::Accepted);
        assert!(svc.guard().is_empty());
        assert_eq!(svc.stats().snapshot().clears, 1);
    }

    #[test]
    fn test_handle_dispatch() {
        let svc = service(4);
        let mut session = svc.open();

        assert_eq!(svc.handle(&mut session, Request::Insert(2)), Response::Accepted);
        assert_eq!(svc.handle(&mut session, Request::Insert(1)), Response::Accepted);
        assert_eq!(svc.handle(&mut session, Request::Clear), Response::Accepted);
        assert_eq!(
            svc.handle(&mut session, Request::ExtractMin),
            Response::Empty(EmptyReason::HeapEmpty)
        );
    }

    #[test]
    fn test_read_bytes() {
        assert_eq!(
            Response::Value(-12).read_bytes().unwrap().as_bytes(),
            b"-12\n"
        );
        assert!(Response::Empty(EmptyReason::HeapEmpty).read_bytes().is_none());
        assert!(Response::Accepted.read_bytes().is_none());
    }

    #[test]
    fn test_session_counters() {
        let svc = service(4);
        let a = svc.open();
        let b = svc.open();
        svc.close(a);

        let stats = svc.stats().snapshot();
        assert_eq!(stats.sessions_opened, 2);
        assert_eq!(stats.sessions_active, 1);
        svc.close(b);
    }

    #[test]
    fn test_capacity_mismatch() {
        let guard = Arc::new(Guard::with_capacity(8));
        let err = Service::new(guard, ServiceConfig::default().with_capacity(4)).err();
        assert_eq!(
            err,
            Some(ConfigError::CapacityMismatch { config: 4, heap: 8 })
        );
    }
}
