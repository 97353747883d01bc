use wiremux_engine::EngineError;
use wiremux_packet::PacketError;

/// Errors surfaced by the client façade.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An engine-layer failure (address derivation, transport, handshake).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A multiplexing-layer packet could not be decoded.
    #[error(transparent)]
    Packet(#[from] PacketError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
