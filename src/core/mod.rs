//! Core module: the bounded min-heap and its lock
//!
//! Design principles:
//! - Fixed capacity: storage allocated once, never resized
//! - Iterative sifts: bounded stack depth
//! - One lock: every mutation is serialized through `Guard`

mod guard;
mod heap_store;

pub use guard::Guard;
pub use heap_store::HeapStore;
