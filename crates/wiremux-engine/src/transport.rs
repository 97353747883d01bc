use bytes::Bytes;

use crate::error::Result;

/// Something that happened on the underlying connection.
///
/// Transports commonly run their own I/O threads; implementations are
/// expected to queue events internally and hand them over from
/// [`Transport::poll_event`], so everything downstream stays on the
/// host-driven tick context.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established (bytes may now flow).
    Opened,
    /// A discrete text frame arrived.
    Text(String),
    /// A discrete binary frame arrived.
    Binary(Bytes),
    /// The transport reports a failure. Not itself a close, though one
    /// usually follows.
    Error(String),
    /// The connection is gone.
    Closed,
}

/// A persistent full-duplex connection carrying discrete text and binary
/// frames. The fundamental seam between wiremux and the host environment.
pub trait Transport: Send {
    /// Open a connection to `url`. Connection outcome is reported through
    /// [`Transport::poll_event`], not the return value.
    fn connect(&mut self, url: &str) -> Result<()>;

    /// Send one text frame. Fire-and-forget; must not block.
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Send one binary frame. Fire-and-forget; must not block.
    fn send_binary(&mut self, data: &[u8]) -> Result<()>;

    /// Tear the connection down.
    fn close(&mut self);

    /// Pull the next queued event, if any.
    fn poll_event(&mut self) -> Option<TransportEvent>;
}

pub type BoxedTransport = Box<dyn Transport>;

/// Builds a fresh transport for each connection attempt. The session is
/// rebuilt from scratch on reconnect, and so is its transport.
pub type TransportFactory = Box<dyn Fn() -> BoxedTransport + Send>;
