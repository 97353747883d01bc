//! Transport-framing (engine) layer for wiremux.
//!
//! Owns the persistent full-duplex connection: derives the transport URL,
//! performs the handshake carried by the Open frame, answers keep-alive
//! probes, watches liveness, and surfaces the opaque messages that the
//! multiplexing layer above decodes. The concrete transport is supplied by
//! the host as a [`Transport`] trait object and polled; this layer never
//! blocks and never schedules threads of its own.

pub mod error;
pub mod frame;
pub mod handshake;
pub mod heartbeat;
pub mod rtt;
pub mod session;
pub mod transport;
pub mod url;

pub use error::{EngineError, Result};
pub use frame::EngineFrame;
pub use handshake::Handshake;
pub use heartbeat::HeartbeatMonitor;
pub use rtt::PingRttTracker;
pub use session::{EngineSession, SessionEvent, SessionState};
pub use transport::{BoxedTransport, Transport, TransportEvent, TransportFactory};
pub use url::build_engine_url;
