//! Challenge-response handshake
//!
//! - [`HandshakeMachine`]: pure transition function over states and inputs
//! - [`HandshakeHarness`]: runs one attempt over a [`gc_core::Transport`]
//! - [`ConnectTemplate`]: the connect request minus the device block

mod error;
mod harness;
mod machine;
mod outcome;
mod params;

pub use error::{HandshakeError, HandshakeStage};
pub use harness::{attempt_tcp, HandshakeHarness};
pub use machine::{Effect, HandshakeMachine, HandshakeState, Input};
pub use outcome::{AttemptReport, HandshakeFailure, HandshakeOutcome, HelloOk};
pub use params::ConnectTemplate;
