//! Request correlation identifiers

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes behind a generated request id (hex encoded on the wire)
const REQUEST_ID_BYTES: usize = 6;

/// Identifier used to match an asynchronous response to its request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Create a request ID from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Produces fresh request ids for one connection attempt.
///
/// Ids look like `req_1a2b3c4d5e6f` (48 random bits).
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    issued: u64,
}

impl RequestIdGenerator {
    /// Create a new generator
    pub fn new() -> Self {
        Self { issued: 0 }
    }

    /// Generate the next request id
    pub fn next_id(&mut self) -> RequestId {
        let mut bytes = [0u8; REQUEST_ID_BYTES];
        rand::thread_rng().fill(&mut bytes);
        self.issued += 1;
        RequestId(format!("req_{}", hex::encode(bytes)))
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.issued
    }
}
