//! Error taxonomy
//!
//! Every failure the queue can report to a caller is recoverable: none of
//! them leaves the heap in a partially-modified state.

use thiserror::Error;

/// Caller-visible outcome of a rejected or empty request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// Insert attempted while `size == capacity`.
    #[error("heap is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// Extract attempted on an empty heap.
    #[error("heap is empty")]
    EmptyHeap,

    /// Payload is not a base-10 `i32`.
    #[error("payload is not a base-10 integer")]
    MalformedInput,

    /// Payload longer than the configured buffer allows.
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    InputTooLarge { len: usize, max: usize },
}

const ENOMEM: i32 = 12;
const EINVAL: i32 = 22;
const ENODATA: i32 = 61;

impl HeapError {
    /// Stable one-byte code carried in the `status` field of error frames.
    #[inline]
    pub fn code(&self) -> u8 {
        match self {
            Self::CapacityExceeded { .. } => 1,
            Self::EmptyHeap => 2,
            Self::MalformedInput => 3,
            Self::InputTooLarge { .. } => 4,
        }
    }

    /// Rebuild an error from its wire code.
    ///
    /// Field values are not transmitted, so they come back zeroed.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::CapacityExceeded { capacity: 0 }),
            2 => Some(Self::EmptyHeap),
            3 => Some(Self::MalformedInput),
            4 => Some(Self::InputTooLarge { len: 0, max: 0 }),
            _ => None,
        }
    }

    /// errno the character-device driver returned for the same condition.
    pub fn errno(&self) -> i32 {
        match self {
            Self::CapacityExceeded { .. } => ENOMEM,
            Self::EmptyHeap => ENODATA,
            Self::MalformedInput | Self::InputTooLarge { .. } => EINVAL,
        }
    }
}

/// Invalid [`ServiceConfig`](crate::config::ServiceConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("capacity must be at least 1")]
    ZeroCapacity,

    #[error("buffer size must be at least 2 bytes, got {0}")]
    BufferTooSmall(usize),

    #[error("configured capacity {config} does not match heap capacity {heap}")]
    CapacityMismatch { config: usize, heap: usize },
}
