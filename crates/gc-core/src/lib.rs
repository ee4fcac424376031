//! gc-core: Core abstractions and configuration for gatecheck
//!
//! This crate provides the configuration structures, error taxonomy,
//! device identity and transport abstraction shared by the handshake
//! client and the CLI.

pub mod config;
pub mod error;
pub mod identity;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{ConfigError, CryptoError, GcError, TransportError};
pub use identity::DeviceIdentity;
pub use traits::{Transport, TransportEvent};
pub use types::{DeviceInfo, Endpoint};
