//! High-level multiplexed protocol client for wiremux.
//!
//! This is the "just works" layer. Connect once, join named channels, emit
//! events with optional acknowledgement callbacks, receive text and binary
//! events, and let the client reconnect with backoff when the connection
//! drops. Everything runs on a single cooperative context driven by the
//! host's regular [`Client::tick`] call; all application callbacks fire
//! from inside that tick, so handler code can treat state as
//! single-threaded.

pub mod ack;
pub mod channel;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod reconnect;
pub mod registry;

pub use ack::{AckCallback, AckPayload, AckTracker};
pub use channel::{Channel, ChannelState, EVENT_CONNECT, EVENT_CONNECT_ERROR};
pub use client::{Client, DEFAULT_ACK_TIMEOUT};
pub use dispatch::Dispatcher;
pub use error::{ClientError, Result};
pub use event::{EventRegistry, HandlerId};
pub use reconnect::{ReconnectConfig, ReconnectScheduler, ReconnectStep};
pub use registry::ChannelRegistry;

pub use wiremux_engine::{Transport, TransportEvent, TransportFactory};
pub use wiremux_packet::{ArgValue, Packet, PacketKind};
