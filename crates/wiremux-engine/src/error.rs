/// Errors raised by the engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The supplied address could not be read as `scheme://host[/path]`.
    #[error("invalid address: {url:?}")]
    InvalidUrl { url: String },

    /// The address scheme maps to no supported transport scheme.
    #[error("unsupported address scheme: {scheme:?}")]
    UnsupportedScheme { scheme: String },

    /// The Open frame's handshake payload could not be parsed.
    /// Fatal to the session: handled like a transport close.
    #[error("unparseable handshake payload: {0}")]
    Handshake(#[from] serde_json::Error),

    /// An engine frame with no recognizable kind digit.
    #[error("unrecognized engine frame kind: {kind:?}")]
    UnknownFrame { kind: char },

    /// The transport received an empty text frame.
    #[error("empty engine frame")]
    EmptyFrame,

    /// Failure reported by the underlying transport.
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
