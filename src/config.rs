//! Service configuration
//!
//! Fixed at construction. The presets reproduce the device variants the
//! queue was first deployed as.

use crate::error::ConfigError;

/// Default heap capacity.
pub const DEFAULT_CAPACITY: usize = 1024;
/// Default input buffer size, terminator byte included.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Queue configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Maximum number of queued values.
    pub capacity: usize,
    /// Input buffer size. Payloads may use `buffer_size - 1` bytes.
    pub buffer_size: usize,
    /// When set, an insert of this value clears the heap instead.
    pub clear_sentinel: Option<i32>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::minheap_device()
    }
}

impl ServiceConfig {
    /// 1024 slots, 256-byte buffer, no sentinel.
    pub const fn minheap_device() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            buffer_size: DEFAULT_BUFFER_SIZE,
            clear_sentinel: None,
        }
    }

    /// 256 slots, 16-byte buffer.
    pub const fn tree_device() -> Self {
        Self {
            capacity: 256,
            buffer_size: 16,
            clear_sentinel: None,
        }
    }

    /// 100 slots, 32-byte buffer, `-1` clears the heap.
    pub const fn legacy_sentinel() -> Self {
        Self {
            capacity: 100,
            buffer_size: 32,
            clear_sentinel: Some(-1),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_clear_sentinel(mut self, sentinel: Option<i32>) -> Self {
        self.clear_sentinel = sentinel;
        self
    }

    /// Longest accepted insert payload.
    #[inline]
    pub fn max_payload(&self) -> usize {
        self.buffer_size.saturating_sub(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.buffer_size < 2 {
            return Err(ConfigError::BufferTooSmall(self.buffer_size));
        }
        Ok(())
    }
}
