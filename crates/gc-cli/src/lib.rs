//! gatecheck: gateway connectivity and handshake diagnostics
//!
//! Provides the `gatecheck` CLI: a staged check of a gateway (tunnel,
//! reachability, transport, handshake) with a console report and a JSON
//! report, a single handshake command, and config management.

pub mod commands;
pub mod output;
pub mod report;
