//! Reassembly of binary packets from their attachment frames.
//!
//! A binary packet arrives as one text header followed by N raw binary
//! frames. At most one reassembly is in flight per client: a new header
//! preempts an incomplete one, which is discarded rather than queued.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::packet::{Packet, PacketKind};
use crate::value::ArgValue;

/// A fully reassembled binary packet, placeholders substituted.
#[derive(Debug, Clone)]
pub struct BinaryMessage {
    /// BinaryEvent or BinaryAck.
    pub kind: PacketKind,
    /// Channel path from the header packet.
    pub channel: String,
    /// Correlation id from the header packet, when present.
    pub correlation_id: Option<i64>,
    /// First string argument, the event name for BinaryEvent.
    pub event: Option<String>,
    /// The substituted argument list.
    pub args: Vec<ArgValue>,
}

struct Reassembly {
    kind: PacketKind,
    channel: String,
    correlation_id: Option<i64>,
    expected: u32,
    payload: serde_json::Value,
    attachments: Vec<Bytes>,
}

/// Accumulates attachment frames for one pending binary packet.
#[derive(Default)]
pub struct BinaryAssembler {
    pending: Option<Reassembly>,
}

impl BinaryAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether attachment frames are currently expected.
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Start collecting attachments for `packet`.
    ///
    /// An unparseable header payload degrades to an empty argument list so
    /// a broken header becomes a no-op event instead of a session failure.
    /// A header expecting zero attachments has nothing to reassemble and is
    /// dropped here.
    pub fn begin(&mut self, packet: &Packet) {
        if self.pending.is_some() {
            warn!("new binary header preempts incomplete reassembly, discarding");
        }

        if packet.attachments == 0 {
            debug!(channel = %packet.channel, "binary header with zero attachments, dropping");
            self.pending = None;
            return;
        }

        let payload = packet
            .payload
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_else(|| {
                warn!(channel = %packet.channel, "unparseable binary header payload");
                serde_json::Value::Array(Vec::new())
            });

        self.pending = Some(Reassembly {
            kind: packet.kind,
            channel: packet.channel.clone(),
            correlation_id: packet.correlation_id,
            expected: packet.attachments,
            payload,
            attachments: Vec::with_capacity(packet.attachments as usize),
        });
    }

    /// Append one attachment frame. Returns true exactly when the expected
    /// count has been reached; false also covers frames arriving with no
    /// reassembly in flight (those are dropped).
    pub fn add(&mut self, data: Bytes) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            debug!(len = data.len(), "binary frame with no reassembly in flight");
            return false;
        };
        pending.attachments.push(data);
        pending.attachments.len() as u32 == pending.expected
    }

    /// Substitute placeholders and hand back the finished message,
    /// resetting internal state.
    pub fn build(&mut self) -> Option<BinaryMessage> {
        let pending = self.pending.take()?;

        let resolved = ArgValue::resolve_placeholders(pending.payload, &pending.attachments);
        let args = match resolved {
            ArgValue::Array(args) => args,
            other => vec![other],
        };
        let event = args.first().and_then(ArgValue::as_str).map(str::to_owned);

        Some(BinaryMessage {
            kind: pending.kind,
            channel: pending.channel,
            correlation_id: pending.correlation_id,
            event,
            args,
        })
    }

    /// Discard any in-flight reassembly without building.
    pub fn abort(&mut self) {
        if self.pending.take().is_some() {
            debug!("binary reassembly aborted");
        }
    }
}
