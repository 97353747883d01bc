/// Errors produced while decoding a multiplexing-layer packet.
///
/// Decoding never panics: any input that cannot be read as a packet yields
/// one of these variants instead. Callers decide whether a malformed packet
/// is reported upward or silently dropped.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// The input was empty.
    #[error("empty packet")]
    Empty,

    /// The first character was not a decimal digit.
    #[error("packet kind is not a digit: {found:?}")]
    InvalidKind { found: char },

    /// The kind digit was outside the defined `0..=6` range.
    #[error("packet kind out of range: {value}")]
    KindOutOfRange { value: u32 },
}

pub type Result<T> = std::result::Result<T, PacketError>;
