//! Per-open read state
//!
//! Each open of the device yields at most one extracted value. After that
//! every read on the same open reports end-of-stream, even when the heap
//! still holds data. An empty-heap read does not use up the open.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct SessionState {
    id: u64,
    consumed: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            consumed: false,
        }
    }

    /// Process-unique id, for logs.
    #[inline(always)]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline(always)]
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    #[inline(always)]
    pub(crate) fn mark_consumed(&mut self) {
        self.consumed = true;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_open() {
        let session = SessionState::new();
        assert!(!session.is_consumed());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = SessionState::new();
        let b = SessionState::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_mark_consumed() {
        let mut session = SessionState::new();
        session.mark_consumed();
        assert!(session.is_consumed());
    }
}
