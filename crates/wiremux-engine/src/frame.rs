//! Engine-layer frame codec.
//!
//! Every text frame starts with one kind digit: 0=Open, 1=Close, 2=Ping,
//! 3=Pong, 4=Message. The remainder is the frame payload.

use crate::error::{EngineError, Result};

/// Wire text of a bare Pong frame.
pub const PONG: &str = "3";

/// One engine-layer text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineFrame {
    /// Handshake payload follows.
    Open(String),
    /// The peer is closing the session.
    Close,
    /// Keep-alive probe; must be answered with a Pong immediately.
    Ping(Option<String>),
    /// Keep-alive answer. The peer measures liveness from these, we do not.
    Pong(Option<String>),
    /// An opaque multiplexing-layer packet.
    Message(String),
}

impl EngineFrame {
    /// Decode one frame from its wire text.
    pub fn decode(raw: &str) -> Result<Self> {
        let mut chars = raw.chars();
        let kind = chars.next().ok_or(EngineError::EmptyFrame)?;
        let rest = chars.as_str();

        match kind {
            '0' => Ok(EngineFrame::Open(rest.to_string())),
            '1' => Ok(EngineFrame::Close),
            '2' => Ok(EngineFrame::Ping(some_nonempty(rest))),
            '3' => Ok(EngineFrame::Pong(some_nonempty(rest))),
            '4' => Ok(EngineFrame::Message(rest.to_string())),
            other => Err(EngineError::UnknownFrame { kind: other }),
        }
    }

    /// Wire text of a Message frame wrapping `payload`.
    pub fn message(payload: &str) -> String {
        format!("4{payload}")
    }
}

fn some_nonempty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
