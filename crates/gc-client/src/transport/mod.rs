//! Transport implementations
//!
//! - [`TcpTransport`]: newline-delimited JSON frames over TCP
//! - [`MemoryTransport`]: in-process channel pair, driven by a [`MemoryPeer`]

mod memory;
mod tcp;

pub use memory::{MemoryPeer, MemoryTransport};
pub use tcp::TcpTransport;
