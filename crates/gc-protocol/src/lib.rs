//! gc-protocol: Wire protocol for the gateway connect handshake
//!
//! This crate defines the JSON frames exchanged with the gateway, the typed
//! handshake payloads, and the codec that turns a byte stream into frames.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod request_id;

pub use codec::{
    classify, decode, decode_inbound, encode, line_text, Inbound, JsonLinesCodec, MAX_FRAME_LEN,
};
pub use error::ProtocolError;
pub use frame::{FrameKind, GatewayFrame};
pub use message::{
    AuthParams, Challenge, ClientInfo, ConnectParams, DeviceAssertion, ErrorShape, HelloAuth,
    HelloPayload, ProtocolField, CHALLENGE_EVENT, CONNECT_METHOD, HELLO_OK, PROTOCOL_VERSION,
};
pub use request_id::{RequestId, RequestIdGenerator};
