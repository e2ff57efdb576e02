//! Network Layer: the device endpoint
//!
//! A Unix-domain socket stands in for the character device node.
//! mio drives the server side; the client is plain blocking std I/O.
//!
//! Features:
//! - Non-blocking I/O with epoll/kqueue
//! - One `SessionState` per accepted connection
//! - Replies queued per connection, in request order

mod client;
mod connection;
mod server;

pub use client::{Client, ClientError};
pub use connection::{Connection, FillStatus};
pub use server::{Server, ShutdownHandle};
