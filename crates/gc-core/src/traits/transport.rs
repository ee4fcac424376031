//! Transport trait

use async_trait::async_trait;

use crate::error::TransportError;

/// Something that happened on an open transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete inbound frame (JSON text)
    Message(String),
    /// A frame arrived but could not be read as text; the connection stays
    /// usable
    Malformed(String),
    /// The transport failed; no further events will be delivered
    Error(String),
    /// The peer closed the connection
    Closed,
}

/// Reliable, ordered, message-oriented duplex channel.
///
/// One transport carries one connection. Implementations must deliver
/// frames in the order they were received and send frames in the order
/// `send` was called.
#[async_trait]
pub trait Transport: Send {
    /// Human-readable description of the remote end (for logs and reports)
    fn peer(&self) -> String;

    /// Establish the connection
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Send one frame
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Wait for the next inbound event.
    ///
    /// Must be cancel safe: dropping the future before it completes must not
    /// lose a frame. After `Error` or `Closed` has been returned, further
    /// calls keep returning `Closed`.
    async fn recv(&mut self) -> TransportEvent;

    /// Close the connection and release its resources
    async fn close(&mut self) -> Result<(), TransportError>;
}
