//! In-process transport backed by tokio channels

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use gc_core::{Transport, TransportError, TransportEvent};

/// Counters shared between a transport and its peer
#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    closes: AtomicUsize,
}

/// Client half of an in-memory connection
pub struct MemoryTransport {
    name: String,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<String>,
    counters: Arc<Counters>,
    open_error: Option<TransportError>,
    open: bool,
    finished: bool,
}

/// Gateway half of an in-memory connection, used to script the remote end
pub struct MemoryPeer {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: mpsc::UnboundedReceiver<String>,
    counters: Arc<Counters>,
}

impl MemoryTransport {
    /// Create a connected transport/peer pair
    pub fn pair(name: impl Into<String>) -> (MemoryTransport, MemoryPeer) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        let transport = MemoryTransport {
            name: name.into(),
            inbound: event_rx,
            outbound: sent_tx,
            counters: Arc::clone(&counters),
            open_error: None,
            open: false,
            finished: false,
        };
        let peer = MemoryPeer {
            events: event_tx,
            sent: sent_rx,
            counters,
        };
        (transport, peer)
    }

    /// Make `open` fail with `error`
    pub fn fail_open(mut self, error: TransportError) -> Self {
        self.open_error = Some(error);
        self
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn peer(&self) -> String {
        format!("memory://{}", self.name)
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        if let Some(error) = self.open_error.clone() {
            return Err(error);
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        self.open = true;
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        if self.finished {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::SendFailed("peer dropped".to_string()))
    }

    async fn recv(&mut self) -> TransportEvent {
        if !self.open || self.finished {
            return TransportEvent::Closed;
        }
        match self.inbound.recv().await {
            Some(TransportEvent::Message(frame)) => TransportEvent::Message(frame),
            Some(TransportEvent::Malformed(reason)) => TransportEvent::Malformed(reason),
            Some(TransportEvent::Error(reason)) => {
                self.finished = true;
                TransportEvent::Error(reason)
            }
            Some(TransportEvent::Closed) | None => {
                self.finished = true;
                TransportEvent::Closed
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.open = false;
        self.finished = true;
        Ok(())
    }
}

impl MemoryPeer {
    /// Deliver a raw frame to the client
    pub fn send_raw(&self, frame: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Message(frame.into()));
    }

    /// Deliver a JSON frame to the client
    pub fn send_json(&self, frame: &serde_json::Value) {
        self.send_raw(frame.to_string());
    }

    /// Deliver a frame the client cannot read as text
    pub fn send_malformed(&self, reason: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Malformed(reason.into()));
    }

    /// Close the connection from the gateway side
    pub fn close(&self) {
        let _ = self.events.send(TransportEvent::Closed);
    }

    /// Fail the connection from the gateway side
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Error(reason.into()));
    }

    /// Wait for the next frame the client sent
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Take a frame the client already sent, without waiting
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }

    /// Number of successful `open` calls
    pub fn open_count(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Number of `close` calls
    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}
