//! Text codec for the multiplexing-layer wire format.
//!
//! Wire shape: `<kind 0-6>[<attachCount>-][/channel,][correlationId]payload`.
//! The default channel `/` is never written. Decoding is defensive: the wire
//! is untrusted, so every malformed shape maps to a typed [`PacketError`] or
//! a tolerated fallback, never a panic.

use tracing::debug;

use crate::error::{PacketError, Result};
use crate::packet::{Packet, PacketKind, DEFAULT_CHANNEL};

/// Decode one packet from its wire text.
///
/// Tolerated irregularities, chosen to keep a single bad packet from ever
/// taking down the session:
/// - a missing or non-numeric attachment count reads as 0;
/// - a correlation-id run too large for `i64` is dropped, and payload
///   parsing continues after it.
pub fn decode(raw: &str) -> Result<Packet> {
    let first = raw.chars().next().ok_or(PacketError::Empty)?;
    let digit = first
        .to_digit(10)
        .ok_or(PacketError::InvalidKind { found: first })?;
    let kind = PacketKind::from_digit(digit).ok_or(PacketError::KindOutOfRange { value: digit })?;
    let mut rest = &raw[1..];

    // Attachment count, binary kinds only: digits up to a literal '-'.
    let mut attachments = 0u32;
    if kind.is_binary() {
        let sep = rest.find('-').unwrap_or(rest.len());
        let run = &rest[..sep];
        if !run.is_empty() {
            attachments = run.parse().unwrap_or_else(|_| {
                debug!(run, "unreadable attachment count, treating as 0");
                0
            });
        }
        rest = rest.get(sep + 1..).unwrap_or("");
    }

    // Channel path: '/' up to the separating comma.
    let mut channel = DEFAULT_CHANNEL.to_string();
    if rest.starts_with('/') {
        let end = rest.find(',').unwrap_or(rest.len());
        channel = rest[..end].to_string();
        rest = rest.get(end + 1..).unwrap_or("");
    }

    // Correlation id: a leading run of decimal digits.
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    let mut correlation_id = None;
    if digits_len > 0 {
        match rest[..digits_len].parse::<i64>() {
            Ok(id) => correlation_id = Some(id),
            Err(_) => debug!(
                run = &rest[..digits_len],
                "correlation id overflows i64, dropping"
            ),
        }
        rest = &rest[digits_len..];
    }

    let payload = (!rest.is_empty()).then(|| rest.to_string());

    Ok(Packet {
        kind,
        channel,
        correlation_id,
        payload,
        attachments,
    })
}

/// Encode a packet to its wire text. Exact inverse of [`decode`] for every
/// well-formed packet.
pub fn encode(packet: &Packet) -> String {
    let mut out = String::new();
    out.push(packet.kind.digit());

    if packet.kind.is_binary() {
        out.push_str(&packet.attachments.to_string());
        out.push('-');
    }

    if packet.channel != DEFAULT_CHANNEL {
        out.push_str(&packet.channel);
        out.push(',');
    }

    if let Some(id) = packet.correlation_id {
        out.push_str(&id.to_string());
    }

    if let Some(payload) = &packet.payload {
        out.push_str(payload);
    }

    out
}
