//! In-process stand-in for the WebSocket transport.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::connection::{Connector, Link, LinkEvent, OUTBOUND_CAPACITY};
use crate::error::SessionError;

/// Hands out one [`MockServer`] per successful connect and records every
/// attempt.
pub struct MockConnector {
    attempts: Mutex<Vec<Instant>>,
    failures: AtomicUsize,
    servers_tx: mpsc::UnboundedSender<MockServer>,
    servers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockServer>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        let (servers_tx, servers_rx) = mpsc::unbounded_channel();
        Self {
            attempts: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(0),
            servers_tx,
            servers_rx: tokio::sync::Mutex::new(servers_rx),
        }
    }

    /// Make the next `n` connects fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    /// The server end of the next successful connect.
    pub async fn next_server(&self) -> MockServer {
        self.servers_rx
            .lock()
            .await
            .recv()
            .await
            .expect("connector dropped")
    }
}

impl Connector for MockConnector {
    fn connect(&self, _url: &str) -> impl Future<Output = Result<Link, SessionError>> + Send {
        self.attempts.lock().unwrap().push(Instant::now());

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let result = if failing {
            Err(SessionError::Transport("connection refused".into()))
        } else {
            let (outbound, from_client) = mpsc::channel(OUTBOUND_CAPACITY);
            let (to_client, inbound) = mpsc::channel(64);
            let _ = self.servers_tx.send(MockServer {
                from_client,
                to_client,
            });
            Ok(Link { outbound, inbound })
        };
        async move { result }
    }
}

/// Server side of one mock link.
pub struct MockServer {
    from_client: mpsc::Receiver<String>,
    to_client: mpsc::Sender<LinkEvent>,
}

impl MockServer {
    /// Next frame the client sent; `None` once the client dropped the link.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    pub async fn push(&self, frame: &str) {
        let _ = self.to_client.send(LinkEvent::Frame(frame.to_string())).await;
    }

    pub async fn push_json(&self, frame: serde_json::Value) {
        self.push(&frame.to_string()).await;
    }

    pub async fn error(&self, reason: &str) {
        let _ = self
            .to_client
            .send(LinkEvent::Errored(reason.to_string()))
            .await;
    }

    pub async fn close(&self) {
        let _ = self.to_client.send(LinkEvent::Closed).await;
    }
}
