//! TCP reachability probe
//!
//! Answers "is anything listening?" before the handshake runs, so a failed
//! check can tell an unreachable gateway from one that refuses the
//! handshake.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;

use gc_core::{Endpoint, TransportError};

/// Connect to `endpoint` and immediately disconnect.
///
/// Returns the time the connect took.
pub async fn probe_tcp(endpoint: &Endpoint, timeout: Duration) -> Result<Duration, TransportError> {
    let address = endpoint.address();
    let started = Instant::now();

    tracing::debug!("Probing {}", address);
    let stream = tokio::time::timeout(timeout, TcpStream::connect(&address))
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            address: address.clone(),
        })?
        .map_err(|e| TransportError::ConnectFailed {
            address: address.clone(),
            reason: e.to_string(),
        })?;
    let latency = started.elapsed();
    drop(stream);

    tracing::debug!("{} reachable in {:?}", address, latency);
    Ok(latency)
}

/// Check that a local port forward is listening on `port`
pub async fn probe_local_forward(port: u16, timeout: Duration) -> Result<Duration, TransportError> {
    probe_tcp(&Endpoint::new("127.0.0.1", port), timeout).await
}
