//! The engine session state machine.
//!
//! Owns the transport for one connection's lifetime: derives the URL,
//! waits for the Open handshake, answers keep-alive probes, watches the
//! liveness deadline, and surfaces multiplexing-layer messages. Events are
//! pulled by the owner through [`EngineSession::tick`]; nothing here blocks
//! or self-schedules. A session never resumes after closing; reconnection
//! means a fresh session.

use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, error, trace, warn};

use crate::error::Result;
use crate::frame::{self, EngineFrame};
use crate::handshake::Handshake;
use crate::heartbeat::HeartbeatMonitor;
use crate::rtt::PingRttTracker;
use crate::transport::{BoxedTransport, TransportEvent};
use crate::url::build_engine_url;

/// Connection lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// What the session surfaces to its owner on each tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Handshake completed; the session is open.
    Opened(Handshake),
    /// A multiplexing-layer packet, framing prefix stripped.
    Message(String),
    /// A raw binary frame (an attachment).
    Binary(Bytes),
    /// A transport or protocol failure, surfaced verbatim.
    Error(String),
    /// The session is gone and will not resume.
    Closed,
}

pub struct EngineSession {
    transport: BoxedTransport,
    heartbeat: HeartbeatMonitor,
    rtt: PingRttTracker,
    state: SessionState,
    handshake: Option<Handshake>,
}

impl EngineSession {
    pub fn new(transport: BoxedTransport) -> Self {
        Self {
            transport,
            heartbeat: HeartbeatMonitor::new(),
            rtt: PingRttTracker::new(),
            state: SessionState::Idle,
            handshake: None,
        }
    }

    /// Derive the transport URL from `address` and open the connection.
    /// The handshake outcome arrives through [`EngineSession::tick`].
    pub fn connect(&mut self, address: &str) -> Result<()> {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "connect ignored, session already used");
            return Ok(());
        }
        let url = build_engine_url(address)?;
        debug!(%url, "opening transport");
        self.state = SessionState::Connecting;
        self.transport.connect(&url)
    }

    /// Tear the session down. No event is raised; the caller initiated it.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.transport.close();
        self.teardown();
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Peer-assigned session id, once open.
    pub fn session_id(&self) -> Option<&str> {
        self.handshake.as_ref().map(|h| h.sid.as_str())
    }

    /// Rough round-trip estimate from probe timing, once observable.
    pub fn ping_rtt(&self) -> Option<std::time::Duration> {
        self.rtt.rtt()
    }

    /// Send one multiplexing-layer packet, wrapped in a Message frame.
    /// A silent no-op before the session is open: nothing is queued for
    /// replay, since reconnection rebuilds state from scratch.
    pub fn send_message(&mut self, packet_text: &str) {
        if self.state != SessionState::Open {
            trace!(state = ?self.state, "dropping send, session not open");
            return;
        }
        if let Err(err) = self.transport.send_text(&EngineFrame::message(packet_text)) {
            warn!(%err, "failed to send message frame");
        }
    }

    /// Send one raw binary frame (an attachment). Same pre-open no-op rule
    /// as [`EngineSession::send_message`].
    pub fn send_binary(&mut self, data: &[u8]) {
        if self.state != SessionState::Open {
            trace!(state = ?self.state, "dropping binary send, session not open");
            return;
        }
        if let Err(err) = self.transport.send_binary(data) {
            warn!(%err, "failed to send binary frame");
        }
    }

    /// Drain transport events and the liveness deadline. Host-driven; call
    /// once per tick.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut out = Vec::new();

        while let Some(event) = self.transport.poll_event() {
            match event {
                TransportEvent::Opened => {
                    // Bytes flow now; the session opens on the Open frame.
                    trace!("transport opened, awaiting handshake");
                }
                TransportEvent::Text(raw) => self.handle_text(&raw, now, &mut out),
                TransportEvent::Binary(data) => out.push(SessionEvent::Binary(data)),
                TransportEvent::Error(message) => {
                    warn!(%message, "transport error");
                    out.push(SessionEvent::Error(message));
                }
                TransportEvent::Closed => {
                    if self.state != SessionState::Closed {
                        debug!("transport closed");
                        self.teardown();
                        out.push(SessionEvent::Closed);
                    }
                }
            }
            if self.state == SessionState::Closed {
                break;
            }
        }

        if self.heartbeat.tick(now) {
            error!("liveness deadline exceeded");
            out.push(SessionEvent::Error("liveness timeout".to_string()));
            self.fail(&mut out);
        }

        out
    }

    fn handle_text(&mut self, raw: &str, now: Instant, out: &mut Vec<SessionEvent>) {
        let frame = match EngineFrame::decode(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "dropping unreadable engine frame");
                return;
            }
        };

        match frame {
            EngineFrame::Open(payload) => match Handshake::parse(&payload) {
                Ok(handshake) => {
                    debug!(
                        sid = %handshake.sid,
                        interval_ms = handshake.ping_interval_ms,
                        timeout_ms = handshake.ping_timeout_ms,
                        "handshake received"
                    );
                    self.heartbeat
                        .start(now, handshake.ping_interval(), handshake.ping_timeout());
                    self.rtt.set_interval(handshake.ping_interval());
                    self.state = SessionState::Open;
                    self.handshake = Some(handshake.clone());
                    out.push(SessionEvent::Opened(handshake));
                }
                Err(err) => {
                    // Fatal to this session, same path as a transport close.
                    error!(%err, "handshake failed");
                    out.push(SessionEvent::Error(err.to_string()));
                    self.fail(out);
                }
            },
            EngineFrame::Ping(_) => {
                trace!("probe received, answering");
                self.rtt.on_ping(now);
                // The peer measures our liveness from this reply; a failed
                // send must be surfaced, never swallowed.
                if let Err(err) = self.transport.send_text(frame::PONG) {
                    warn!(%err, "failed to answer probe");
                    out.push(SessionEvent::Error(format!("probe answer failed: {err}")));
                }
                self.heartbeat.on_liveness(now);
            }
            EngineFrame::Pong(_) => {
                // The peer does not answer us; nothing to track.
                trace!("pong received");
            }
            EngineFrame::Message(payload) => {
                if self.state == SessionState::Open {
                    out.push(SessionEvent::Message(payload));
                } else {
                    trace!("dropping message before open");
                }
            }
            EngineFrame::Close => {
                debug!("close frame received");
                self.transport.close();
                self.teardown();
                out.push(SessionEvent::Closed);
            }
        }
    }

    fn fail(&mut self, out: &mut Vec<SessionEvent>) {
        self.transport.close();
        self.teardown();
        out.push(SessionEvent::Closed);
    }

    fn teardown(&mut self) {
        self.heartbeat.stop();
        self.rtt.reset();
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::transport::Transport;

    struct MockTransport {
        inbox: Arc<Mutex<VecDeque<TransportEvent>>>,
        sent: Arc<Mutex<Vec<String>>>,
        urls: Arc<Mutex<Vec<String>>>,
    }

    impl Transport for MockTransport {
        fn connect(&mut self, url: &str) -> Result<()> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(())
        }

        fn send_text(&mut self, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn send_binary(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) {}

        fn poll_event(&mut self) -> Option<TransportEvent> {
            self.inbox.lock().unwrap().pop_front()
        }
    }

    type Shared<T> = Arc<Mutex<T>>;

    fn session() -> (EngineSession, Shared<VecDeque<TransportEvent>>, Shared<Vec<String>>, Shared<Vec<String>>) {
        let inbox = Arc::new(Mutex::new(VecDeque::new()));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let urls = Arc::new(Mutex::new(Vec::new()));
        let transport = Box::new(MockTransport {
            inbox: Arc::clone(&inbox),
            sent: Arc::clone(&sent),
            urls: Arc::clone(&urls),
        });
        (EngineSession::new(transport), inbox, sent, urls)
    }

    fn push(inbox: &Shared<VecDeque<TransportEvent>>, event: TransportEvent) {
        inbox.lock().unwrap().push_back(event);
    }

    const HANDSHAKE: &str = r#"0{"sid":"abc","pingInterval":25000,"pingTimeout":5000}"#;

    fn open(session: &mut EngineSession, inbox: &Shared<VecDeque<TransportEvent>>, now: Instant) {
        session.connect("http://example.test").unwrap();
        push(inbox, TransportEvent::Opened);
        push(inbox, TransportEvent::Text(HANDSHAKE.to_string()));
        let events = session.tick(now);
        assert!(matches!(events[0], SessionEvent::Opened(_)));
    }

    #[test]
    fn test_connect_derives_transport_url() {
        let (mut session, _inbox, _sent, urls) = session();
        session.connect("https://example.test/rt/").unwrap();
        assert_eq!(
            urls.lock().unwrap()[0],
            "wss://example.test/rt/?EIO=4&transport=websocket"
        );
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn test_handshake_opens_session() {
        let now = Instant::now();
        let (mut session, inbox, _sent, _urls) = session();
        open(&mut session, &inbox, now);
        assert!(session.is_open());
        assert_eq!(session.session_id(), Some("abc"));
    }

    #[test]
    fn test_ping_answered_with_pong() {
        let now = Instant::now();
        let (mut session, inbox, sent, _urls) = session();
        open(&mut session, &inbox, now);

        push(&inbox, TransportEvent::Text("2".to_string()));
        session.tick(now + Duration::from_secs(1));
        assert_eq!(sent.lock().unwrap().last().map(String::as_str), Some("3"));
    }

    #[test]
    fn test_message_frame_prefix_stripped() {
        let now = Instant::now();
        let (mut session, inbox, _sent, _urls) = session();
        open(&mut session, &inbox, now);

        push(&inbox, TransportEvent::Text(r#"42["chat","hi"]"#.to_string()));
        let events = session.tick(now);
        assert_eq!(
            events,
            vec![SessionEvent::Message(r#"2["chat","hi"]"#.to_string())]
        );
    }

    #[test]
    fn test_liveness_timeout_closes_session() {
        let now = Instant::now();
        let (mut session, inbox, _sent, _urls) = session();
        open(&mut session, &inbox, now);

        let events = session.tick(now + Duration::from_millis(30_001));
        assert!(matches!(events[0], SessionEvent::Error(_)));
        assert!(matches!(events[1], SessionEvent::Closed));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_bad_handshake_is_fatal() {
        let now = Instant::now();
        let (mut session, inbox, _sent, _urls) = session();
        session.connect("ws://example.test").unwrap();

        push(&inbox, TransportEvent::Text("0not json".to_string()));
        let events = session.tick(now);
        assert!(matches!(events[0], SessionEvent::Error(_)));
        assert!(matches!(events[1], SessionEvent::Closed));
    }

    #[test]
    fn test_send_before_open_is_silent_noop() {
        let (mut session, _inbox, sent, _urls) = session();
        session.connect("ws://example.test").unwrap();
        session.send_message("0");
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_close_frame_tears_down() {
        let now = Instant::now();
        let (mut session, inbox, _sent, _urls) = session();
        open(&mut session, &inbox, now);

        push(&inbox, TransportEvent::Text("1".to_string()));
        let events = session.tick(now);
        assert_eq!(events, vec![SessionEvent::Closed]);
        assert!(!session.is_open());
    }

    #[test]
    fn test_binary_frames_surface() {
        let now = Instant::now();
        let (mut session, inbox, _sent, _urls) = session();
        open(&mut session, &inbox, now);

        push(&inbox, TransportEvent::Binary(Bytes::from_static(b"\x01")));
        let events = session.tick(now);
        assert_eq!(events, vec![SessionEvent::Binary(Bytes::from_static(b"\x01"))]);
    }
}
