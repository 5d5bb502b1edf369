//! Single-slot bridge between a fire-and-forget send and its out-of-band
//! confirmation frame.
//!
//! The protocol carries no correlation id, so at most one request can be
//! matched to a reply. Registering while another request is in flight moves
//! the earlier one aside: it can no longer be settled by a server reply and
//! will only ever settle through its own deadline. `save_all` on the client
//! handle serializes saves to stay clear of this.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::SessionError;

pub type RequestId = u64;

pub type PendingReply<T> = oneshot::Sender<Result<T, SessionError>>;

pub struct PendingSlot<T> {
    current: Option<(RequestId, PendingReply<T>)>,
    /// Overwritten entries, reachable only by their deadline.
    displaced: HashMap<RequestId, PendingReply<T>>,
    next_id: RequestId,
    timeout: Duration,
}

impl<T> PendingSlot<T> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            current: None,
            displaced: HashMap::new(),
            next_id: 1,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Store `reply` in the slot. The caller arms a deadline for the returned
    /// id and calls [`PendingSlot::expire`] when it fires.
    pub fn register(&mut self, reply: PendingReply<T>) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;

        if let Some((old_id, old_reply)) = self.current.replace((id, reply)) {
            warn!(
                displaced = old_id,
                request = id,
                "pending request overwritten before confirmation"
            );
            self.displaced.insert(old_id, old_reply);
        }
        id
    }

    /// Settle the in-flight request with a value. Returns false if the slot
    /// was empty.
    pub fn resolve_one(&mut self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle the in-flight request with an error. Returns false if the slot
    /// was empty.
    pub fn reject_one(&mut self, err: SessionError) -> bool {
        self.settle(Err(err))
    }

    fn settle(&mut self, result: Result<T, SessionError>) -> bool {
        match self.current.take() {
            Some((id, reply)) => {
                if reply.send(result).is_err() {
                    debug!(request = id, "pending requester went away");
                }
                true
            }
            None => false,
        }
    }

    /// Deadline for `id` fired. Rejects it with a timeout if still unsettled,
    /// whether it holds the slot or was displaced.
    pub fn expire(&mut self, id: RequestId) -> bool {
        let reply = match self.current.take() {
            Some((current_id, reply)) if current_id == id => Some(reply),
            other => {
                self.current = other;
                self.displaced.remove(&id)
            }
        };

        match reply {
            Some(reply) => {
                debug!(request = id, "pending request timed out");
                let _ = reply.send(Err(SessionError::Timeout {
                    after: self.timeout,
                }));
                true
            }
            None => false,
        }
    }

    /// Reject everything, in the slot or displaced, with `err_fn()`.
    pub fn reject_all(&mut self, err_fn: impl Fn() -> SessionError) {
        if let Some((_, reply)) = self.current.take() {
            let _ = reply.send(Err(err_fn()));
        }
        for (_, reply) in self.displaced.drain() {
            let _ = reply.send(Err(err_fn()));
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.current.is_some()
    }
}
