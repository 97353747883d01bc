use serde_json::Value;

/// Path of the default channel. Omitted entirely on the wire.
pub const DEFAULT_CHANNEL: &str = "/";

/// Multiplexing-layer packet kinds, one per wire digit `0..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Join a channel (optionally carrying an auth payload).
    Connect = 0,
    /// Leave a channel.
    Disconnect = 1,
    /// Application event with a JSON argument list.
    Event = 2,
    /// Acknowledgement of a correlated event.
    Ack = 3,
    /// Channel join was rejected by the peer.
    ConnectError = 4,
    /// Event whose argument list references binary attachments.
    BinaryEvent = 5,
    /// Acknowledgement whose argument list references binary attachments.
    BinaryAck = 6,
}

impl PacketKind {
    /// Map a wire digit to a packet kind.
    pub fn from_digit(digit: u32) -> Option<Self> {
        match digit {
            0 => Some(PacketKind::Connect),
            1 => Some(PacketKind::Disconnect),
            2 => Some(PacketKind::Event),
            3 => Some(PacketKind::Ack),
            4 => Some(PacketKind::ConnectError),
            5 => Some(PacketKind::BinaryEvent),
            6 => Some(PacketKind::BinaryAck),
            _ => None,
        }
    }

    /// The wire digit for this kind.
    pub fn digit(self) -> char {
        (b'0' + self as u8) as char
    }

    /// Whether this kind carries binary attachments.
    pub fn is_binary(self) -> bool {
        matches!(self, PacketKind::BinaryEvent | PacketKind::BinaryAck)
    }
}

/// One multiplexing-layer message.
///
/// Immutable once constructed: produced by [`crate::codec::decode`] or one of
/// the constructors below, consumed by routing. `attachments` is nonzero only
/// for the binary kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The packet kind.
    pub kind: PacketKind,
    /// Channel path. Defaults to [`DEFAULT_CHANNEL`].
    pub channel: String,
    /// Request/response correlation id, when present.
    pub correlation_id: Option<i64>,
    /// Raw encoded argument list, when present.
    pub payload: Option<String>,
    /// Number of binary attachment frames that follow this packet.
    pub attachments: u32,
}

impl Packet {
    /// A packet of `kind` on `channel` with no correlation id or payload.
    pub fn new(kind: PacketKind, channel: impl Into<String>) -> Self {
        Self {
            kind,
            channel: channel.into(),
            correlation_id: None,
            payload: None,
            attachments: 0,
        }
    }

    /// A Connect request for `channel`, embedding `auth` when present.
    ///
    /// Auth is connection-time only; it travels as the trailing payload of
    /// the Connect packet and nowhere else.
    pub fn connect(channel: impl Into<String>, auth: Option<&Value>) -> Self {
        Self {
            payload: auth.map(Value::to_string),
            ..Self::new(PacketKind::Connect, channel)
        }
    }

    /// A Disconnect notice for `channel`.
    pub fn disconnect(channel: impl Into<String>) -> Self {
        Self::new(PacketKind::Disconnect, channel)
    }

    /// An Event on `channel`, optionally correlated for acknowledgement.
    pub fn event(
        channel: impl Into<String>,
        correlation_id: Option<i64>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            payload: Some(payload.into()),
            ..Self::new(PacketKind::Event, channel)
        }
    }
}
