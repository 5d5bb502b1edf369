//! Timers delivered back into the session loop.
//!
//! Each scheduled timer is a sleeping task that posts an [`Event::Timer`]
//! when it wakes. Connection-scoped timers share one cancellation scope that
//! a manual disconnect cancels and replaces, so nothing armed before the
//! disconnect can fire after it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::pending::RequestId;
use crate::state::ErrorSlot;

/// Something the loop asked to be woken up for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timer {
    /// Open a fresh transport after a close.
    Reconnect,
    /// Send `load_chat` for the chat that was active when `generation` opened.
    Resume { generation: u64, chat_id: String },
    /// The pending save `RequestId` went unconfirmed.
    SaveDeadline(RequestId),
    /// Clear an error text, unless it was replaced since.
    ErrorExpiry { slot: ErrorSlot, token: u64 },
}

/// Inputs to the session loop other than caller commands.
#[derive(Debug)]
pub enum Event {
    Connection {
        generation: u64,
        event: crate::connection::ConnectionEvent,
    },
    Timer(Timer),
}

pub type EventSender = mpsc::UnboundedSender<Event>;

pub struct Scheduler {
    events: EventSender,
    scope: CancellationToken,
}

impl Scheduler {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            scope: CancellationToken::new(),
        }
    }

    /// Token that connection-scoped work should run under.
    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Arm a timer that dies with the current connection scope.
    pub fn schedule(&self, after: Duration, timer: Timer) {
        self.spawn(after, timer, self.scope.clone());
    }

    /// Arm a timer that survives a manual disconnect.
    pub fn schedule_detached(&self, after: Duration, timer: Timer) {
        self.spawn(after, timer, CancellationToken::new());
    }

    fn spawn(&self, after: Duration, timer: Timer, cancel: CancellationToken) {
        trace!(?timer, ?after, "timer armed");
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    // Receiver gone means the loop shut down.
                    let _ = events.send(Event::Timer(timer));
                }
            }
        });
    }

    /// Cancel every connection-scoped timer and open a fresh scope.
    pub fn cancel_connection_timers(&mut self) {
        self.scope.cancel();
        self.scope = CancellationToken::new();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
