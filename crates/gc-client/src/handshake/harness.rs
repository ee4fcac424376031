//! Connection harness
//!
//! Runs exactly one handshake attempt over a transport: open, pump inbound
//! frames through the codec into the [`HandshakeMachine`], send what the
//! machine asks for, and race everything against the handshake deadline
//! and a [`CancellationToken`].
//!
//! The transport is closed on every exit path, except when the peer closed
//! it first.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use gc_core::config::GatecheckConfig;
use gc_core::{DeviceIdentity, Transport, TransportError, TransportEvent};
use gc_protocol::{decode_inbound, encode};

use super::error::{HandshakeError, HandshakeStage};
use super::machine::{Effect, HandshakeMachine, Input};
use super::outcome::{AttemptReport, HandshakeOutcome};
use super::params::ConnectTemplate;
use crate::transport::TcpTransport;

/// One handshake attempt, ready to run
#[derive(Debug)]
pub struct HandshakeHarness {
    template: ConnectTemplate,
    identity: Option<DeviceIdentity>,
    timeout: Duration,
}

impl HandshakeHarness {
    /// Create a harness.
    ///
    /// `timeout` bounds everything after the transport is open. Without an
    /// identity the connect request is sent without a device block.
    pub fn new(
        template: ConnectTemplate,
        identity: Option<DeviceIdentity>,
        timeout: Duration,
    ) -> Self {
        Self {
            template,
            identity,
            timeout,
        }
    }

    /// Run the attempt to completion.
    ///
    /// Always returns a report; every failure is a `Failed` outcome.
    pub async fn run<T>(self, transport: &mut T, cancel: CancellationToken) -> AttemptReport
    where
        T: Transport + ?Sized,
    {
        let started = Instant::now();
        let peer = transport.peer();
        let device = self.identity.as_ref().map(DeviceIdentity::info);

        tracing::info!("Starting handshake with {}", peer);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HandshakeError::Cancelled),
            result = transport.open() => result.map_err(HandshakeError::Transport),
        };

        if let Err(error) = opened {
            // A cancelled open may have left a half-open connection behind
            if error == HandshakeError::Cancelled {
                close_quietly(transport).await;
            }
            tracing::info!("Handshake failed at {}: {}", HandshakeStage::Connect, error);
            return AttemptReport {
                outcome: HandshakeOutcome::failed(error, HandshakeStage::Connect),
                elapsed: started.elapsed(),
                device,
                peer,
                ignored_frames: 0,
            };
        }

        let deadline = Instant::now() + self.timeout;
        let mut machine = HandshakeMachine::new(self.template, self.identity);
        let (outcome, peer_closed) = drive(&mut machine, transport, &cancel, deadline).await;

        if !peer_closed {
            close_quietly(transport).await;
        }

        AttemptReport {
            outcome,
            elapsed: started.elapsed(),
            device,
            peer,
            ignored_frames: machine.ignored_frames(),
        }
    }
}

/// Feed the machine until it completes.
///
/// Returns the outcome and whether the peer closed the transport.
async fn drive<T>(
    machine: &mut HandshakeMachine,
    transport: &mut T,
    cancel: &CancellationToken,
    deadline: Instant,
) -> (HandshakeOutcome, bool)
where
    T: Transport + ?Sized,
{
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    let mut peer_closed = false;

    loop {
        let input = tokio::select! {
            biased;
            _ = cancel.cancelled() => Input::Cancel,
            _ = &mut sleep => Input::Timeout,
            event = transport.recv() => match event {
                TransportEvent::Message(raw) => {
                    tracing::debug!("<- {}", raw);
                    match decode_inbound(&raw) {
                        Ok(inbound) => Input::Frame(inbound),
                        Err(e) => Input::DecodeFailed(e.to_string()),
                    }
                }
                TransportEvent::Malformed(reason) => {
                    tracing::debug!("<- unreadable frame: {}", reason);
                    Input::DecodeFailed(reason)
                }
                TransportEvent::Error(reason) => {
                    Input::TransportError(TransportError::ReceiveFailed(reason))
                }
                TransportEvent::Closed => {
                    peer_closed = true;
                    Input::TransportClosed
                }
            },
        };

        let mut effects: VecDeque<Effect> = machine.handle(input).into();
        while let Some(effect) = effects.pop_front() {
            match effect {
                Effect::Send(frame) => {
                    let sent = match encode(&frame) {
                        Ok(text) => {
                            tracing::debug!("-> {}", frame.label());
                            transport.send(text).await
                        }
                        Err(e) => Err(TransportError::SendFailed(e.to_string())),
                    };
                    if let Err(e) = sent {
                        effects.extend(machine.handle(Input::TransportError(e)));
                    }
                }
                Effect::Complete(outcome) => return (outcome, peer_closed),
            }
        }
    }
}

async fn close_quietly<T>(transport: &mut T)
where
    T: Transport + ?Sized,
{
    if let Err(e) = transport.close().await {
        tracing::warn!("Failed to close {}: {}", transport.peer(), e);
    }
}

/// Run one attempt against the gateway in `config` over TCP.
///
/// A fresh device identity is generated for the attempt when device auth is
/// enabled.
pub async fn attempt_tcp(
    config: &GatecheckConfig,
    template: ConnectTemplate,
    cancel: CancellationToken,
) -> AttemptReport {
    let endpoint = config.gateway.endpoint();
    let mut transport = TcpTransport::new(endpoint, config.probe.timeout);

    let identity = if config.handshake.device_auth {
        match DeviceIdentity::create() {
            Ok(identity) => Some(identity),
            Err(e) => return AttemptReport::not_started(transport.peer(), HandshakeError::Crypto(e)),
        }
    } else {
        None
    };

    HandshakeHarness::new(template, identity, config.handshake.timeout)
        .run(&mut transport, cancel)
        .await
}
