//! minheap - Bounded Min-Priority Queue Service
//!
//! Architecture:
//! - Core: fixed-capacity binary min-heap behind a single lock
//! - Protocol: decimal text payloads, fixed-header framing
//! - Service: per-open one-shot reads, insert/clear/extract dispatch
//! - Network: device-style endpoint on a Unix socket (mio)

pub mod config;
pub mod core;
pub mod error;
#[cfg(unix)]
pub mod network;
pub mod protocol;
pub mod service;

pub use crate::config::ServiceConfig;
pub use crate::core::{Guard, HeapStore};
pub use crate::error::{ConfigError, HeapError};
pub use crate::protocol::{decode_insert, encode_extract, Request};
pub use crate::service::{EmptyReason, Response, Service, SessionState};
