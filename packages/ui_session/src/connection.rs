//! ConnectionManager: owns the single transport to the orchestration service.
//!
//! Lifecycle: `connect()` spawns a link task for a new generation. Once the
//! link opens the manager registers (credential, capabilities, fresh session
//! id), asks for history, and schedules the resume `load_chat` if a chat was
//! active. Any close or error marks the manager disconnected and schedules a
//! reconnect after a fixed delay, indefinitely. Only `disconnect()` stops it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::protocol::{ClientAction, Envelope};
use crate::timers::{Event, EventSender, Scheduler, Timer};

/// Capacity of the outbound frame queue of one link.
pub const OUTBOUND_CAPACITY: usize = 100;

/// What a live link reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Frame(String),
    Errored(String),
    Closed,
}

/// An open transport: outbound text frames in, inbound events out.
/// Dropping `outbound` closes the transport.
pub struct Link {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<LinkEvent>,
}

/// Opens transports. Implemented over WebSockets by
/// [`crate::transport::WsConnector`].
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> impl Future<Output = Result<Link, SessionError>> + Send;
}

/// Link task output, tagged with a generation by [`Event::Connection`].
#[derive(Debug)]
pub enum ConnectionEvent {
    Opened(mpsc::Sender<String>),
    Link(LinkEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; a reconnect may be scheduled.
    Disconnected,
    Connecting,
    Open,
    /// Manually disconnected. Nothing will reconnect on its own.
    Closed,
}

pub struct ConnectionManager<C> {
    connector: Arc<C>,
    url: String,
    capabilities: Vec<String>,
    reconnect_delay: Duration,
    resume_delay: Duration,
    state: ConnectionState,
    generation: u64,
    token: Option<String>,
    session_id: Option<String>,
    outbound: Option<mpsc::Sender<String>>,
    link_cancel: Option<CancellationToken>,
    connected: watch::Sender<bool>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: Arc<C>, config: &ClientConfig) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            connector,
            url: config.url.clone(),
            capabilities: config.capabilities.clone(),
            reconnect_delay: config.timings.reconnect_delay,
            resume_delay: config.timings.resume_delay,
            state: ConnectionState::Disconnected,
            generation: 0,
            token: None,
            session_id: None,
            outbound: None,
            link_cancel: None,
            connected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Session id sent with the current registration, if open.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Start a connection attempt. Without a credential, or while already
    /// connecting or open, this does nothing.
    pub fn connect(&mut self, token: Option<String>, timers: &Scheduler) {
        let Some(token) = token else {
            debug!("no credential available, not connecting");
            return;
        };
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            debug!(state = ?self.state, "connect ignored");
            return;
        }

        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.token = Some(token);

        let cancel = timers.scope().child_token();
        self.link_cancel = Some(cancel.clone());

        info!(generation = self.generation, url = %self.url, "connecting");
        spawn_link(
            self.connector.clone(),
            self.url.clone(),
            self.generation,
            timers.events().clone(),
            cancel,
        );
    }

    /// Handle an event from a link task. Returns the frame text to dispatch
    /// when the event carries one from the current link.
    pub fn handle(
        &mut self,
        generation: u64,
        event: ConnectionEvent,
        active_chat: Option<&str>,
        timers: &Scheduler,
    ) -> Option<String> {
        let live = generation == self.generation
            && matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Open
            );
        if !live {
            debug!(generation, current = self.generation, "ignoring stale link event");
            return None;
        }

        match event {
            ConnectionEvent::Opened(outbound) => {
                self.on_open(outbound, active_chat, timers);
                None
            }
            ConnectionEvent::Link(LinkEvent::Frame(text)) => Some(text),
            ConnectionEvent::Link(LinkEvent::Errored(reason)) => {
                warn!(generation, error = %reason, "transport error, forcing close");
                self.on_close(timers);
                None
            }
            ConnectionEvent::Link(LinkEvent::Closed) => {
                self.on_close(timers);
                None
            }
        }
    }

    fn on_open(
        &mut self,
        outbound: mpsc::Sender<String>,
        active_chat: Option<&str>,
        timers: &Scheduler,
    ) {
        let session_id = uuid::Uuid::now_v7().to_string();
        info!(generation = self.generation, session = %session_id, "transport open");

        self.state = ConnectionState::Open;
        self.outbound = Some(outbound);
        self.session_id = Some(session_id.clone());
        self.connected.send_replace(true);

        let token = self.token.clone().unwrap_or_default();
        let register = Envelope::register(&session_id, &token, &self.capabilities);
        self.send_envelope(&register);
        self.send(&ClientAction::GetHistory);

        if let Some(chat_id) = active_chat {
            debug!(chat = %chat_id, delay = ?self.resume_delay, "scheduling resume");
            timers.schedule(
                self.resume_delay,
                Timer::Resume {
                    generation: self.generation,
                    chat_id: chat_id.to_string(),
                },
            );
        }
    }

    fn on_close(&mut self, timers: &Scheduler) {
        self.drop_link();
        self.state = ConnectionState::Disconnected;
        self.connected.send_replace(false);

        info!(
            generation = self.generation,
            delay = ?self.reconnect_delay,
            "transport closed, scheduling reconnect"
        );
        timers.schedule(self.reconnect_delay, Timer::Reconnect);
    }

    fn drop_link(&mut self) {
        self.outbound = None;
        self.session_id = None;
        if let Some(cancel) = self.link_cancel.take() {
            cancel.cancel();
        }
    }

    /// The resume timer fired. Only acts if the same link is still open.
    pub fn resume(&self, generation: u64, chat_id: String) {
        if generation != self.generation || !self.is_connected() {
            debug!(generation, chat = %chat_id, "resume skipped, link changed");
            return;
        }
        info!(chat = %chat_id, "resuming chat");
        self.send(&ClientAction::LoadChat { chat_id });
    }

    /// Tear down the transport and every connection-scoped timer. The
    /// manager stays down until the next explicit `connect()`.
    pub fn disconnect(&mut self, timers: &mut Scheduler) {
        timers.cancel_connection_timers();
        self.drop_link();
        if self.state != ConnectionState::Closed {
            info!(generation = self.generation, "disconnected");
        }
        self.state = ConnectionState::Closed;
        self.connected.send_replace(false);
    }

    /// Send an action wrapped in a `ui_event` envelope. Silently dropped
    /// unless open; returns whether it was queued.
    pub fn send(&self, action: &ClientAction) -> bool {
        if !self.is_connected() {
            debug!(action = action.name(), "not connected, dropping action");
            return false;
        }
        self.send_envelope(&Envelope::event(action, self.session_id.as_deref()))
    }

    fn send_envelope(&self, envelope: &Envelope) -> bool {
        let Some(outbound) = &self.outbound else {
            return false;
        };
        let json = match envelope.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize envelope");
                return false;
            }
        };
        match outbound.try_send(json) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "outbound queue rejected frame");
                false
            }
        }
    }
}

/// Open a link and forward its events, tagged with `generation`, until it
/// closes or `cancel` fires. A failed connect reports as a close.
fn spawn_link<C: Connector>(
    connector: Arc<C>,
    url: String,
    generation: u64,
    events: EventSender,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let forward = |event: ConnectionEvent| {
            events
                .send(Event::Connection { generation, event })
                .is_ok()
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = connector.connect(&url) => result,
        };

        let mut link = match result {
            Ok(link) => link,
            Err(e) => {
                warn!(generation, error = %e, "connect failed");
                forward(ConnectionEvent::Link(LinkEvent::Closed));
                return;
            }
        };

        if !forward(ConnectionEvent::Opened(link.outbound)) {
            return;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = link.inbound.recv() => {
                    let event = event.unwrap_or(LinkEvent::Closed);
                    let done = !matches!(event, LinkEvent::Frame(_));
                    if !forward(ConnectionEvent::Link(event)) || done {
                        break;
                    }
                }
            }
        }
    });
}
