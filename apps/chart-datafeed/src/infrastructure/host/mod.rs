//! Host Adapters
//!
//! Implementations of `HostPort`.

pub mod in_memory;

pub use in_memory::{InMemoryHost, REQUEST_LOG_CAPACITY};
