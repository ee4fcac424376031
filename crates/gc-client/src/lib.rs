//! gc-client: gateway handshake client
//!
//! This crate runs the connect handshake against a gateway: it answers the
//! server's challenge with a signed device assertion and exchanges it for a
//! device token. It also provides the transports, a TCP reachability probe
//! and caller-level retry.

pub mod handshake;
pub mod probe;
pub mod retry;
pub mod transport;

pub use handshake::{
    AttemptReport, ConnectTemplate, HandshakeError, HandshakeHarness, HandshakeOutcome,
    HandshakeStage, HelloOk,
};
pub use retry::{connect_with_retry, ExponentialBackoff};
pub use transport::{MemoryPeer, MemoryTransport, TcpTransport};
