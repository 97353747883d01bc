use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Handshake payload carried by the engine Open frame.
///
/// `pingInterval` and `pingTimeout` are advertised by the peer in
/// milliseconds and drive the liveness deadline for the whole session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Handshake {
    /// Peer-assigned session identifier.
    pub sid: String,
    /// Expected spacing between keep-alive probes, in milliseconds.
    #[serde(rename = "pingInterval")]
    pub ping_interval_ms: u64,
    /// Grace period past the interval before the session is dead, in
    /// milliseconds.
    #[serde(rename = "pingTimeout")]
    pub ping_timeout_ms: u64,
}

impl Handshake {
    /// Parse the Open frame payload. Failure is fatal to the session.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}
