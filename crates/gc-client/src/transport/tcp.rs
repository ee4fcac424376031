//! TCP transport carrying one JSON frame per line

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use gc_core::{Endpoint, Transport, TransportError, TransportEvent};
use gc_protocol::{line_text, JsonLinesCodec};

/// TCP connection framed with [`JsonLinesCodec`]
pub struct TcpTransport {
    endpoint: Endpoint,
    connect_timeout: Duration,
    framed: Option<Framed<TcpStream, JsonLinesCodec>>,
    /// Set once `recv` has reported an error or end of stream
    finished: bool,
}

impl TcpTransport {
    /// Create an unopened transport for `endpoint`
    pub fn new(endpoint: Endpoint, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
            framed: None,
            finished: false,
        }
    }

    /// Wrap an already connected stream (the accepting side of a connection)
    pub fn from_stream(stream: TcpStream, endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            connect_timeout: Duration::ZERO,
            framed: Some(Framed::new(stream, JsonLinesCodec::new())),
            finished: false,
        }
    }

    /// Whether the connection is currently open
    pub fn is_open(&self) -> bool {
        self.framed.is_some() && !self.finished
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn peer(&self) -> String {
        format!("tcp://{}", self.endpoint)
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        if self.framed.is_some() {
            return Ok(());
        }

        let address = self.endpoint.address();
        tracing::debug!("Connecting to {}", address);

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                address: address.clone(),
            })?
            .map_err(|e| TransportError::ConnectFailed {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        tracing::debug!("Connected to {}", address);
        self.framed = Some(Framed::new(stream, JsonLinesCodec::new()));
        self.finished = false;
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if self.finished {
            return Err(TransportError::Closed);
        }
        let framed = self.framed.as_mut().ok_or(TransportError::NotOpen)?;
        framed
            .send(frame)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> TransportEvent {
        if self.finished {
            return TransportEvent::Closed;
        }
        let framed = match self.framed.as_mut() {
            Some(framed) => framed,
            None => return TransportEvent::Closed,
        };

        match framed.next().await {
            Some(Ok(line)) => match line_text(&line) {
                Ok(text) => TransportEvent::Message(text),
                Err(e) => TransportEvent::Malformed(e.to_string()),
            },
            Some(Err(e)) => {
                self.finished = true;
                TransportEvent::Error(e.to_string())
            }
            None => {
                self.finished = true;
                TransportEvent::Closed
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.framed.take() {
            Some(mut framed) => {
                tracing::debug!("Closing connection to {}", self.endpoint);
                self.finished = true;
                framed
                    .close()
                    .await
                    .map_err(|e| TransportError::CloseFailed(e.to_string()))
            }
            None => Ok(()),
        }
    }
}
