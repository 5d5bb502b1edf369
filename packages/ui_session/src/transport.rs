//! WebSocket transport over tokio-tungstenite.

use std::future::Future;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::connection::{Connector, Link, LinkEvent, OUTBOUND_CAPACITY};
use crate::error::SessionError;

const INBOUND_CAPACITY: usize = 256;

/// Production [`Connector`]: one WebSocket per link.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> impl Future<Output = Result<Link, SessionError>> + Send {
        let url = url.to_string();
        async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
                .await
                .map_err(SessionError::from_tungstenite)?;
            debug!(url = %url, "websocket handshake complete");

            let (mut ws_write, mut ws_read) = ws_stream.split();
            let (outbound, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
            let (inbound_tx, inbound) = mpsc::channel::<LinkEvent>(INBOUND_CAPACITY);

            // Writer: drain outbound frames into the socket. The manager
            // dropping its sender ends the loop and closes the socket.
            tokio::spawn(async move {
                while let Some(text) = outbound_rx.recv().await {
                    if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                        warn!(error = %e, "websocket write failed");
                        return;
                    }
                }
                let _ = ws_write.close().await;
            });

            // Reader: forward text frames until the socket ends.
            tokio::spawn(async move {
                while let Some(msg) = ws_read.next().await {
                    let event = match msg {
                        Ok(Message::Text(text)) => LinkEvent::Frame(text.to_string()),
                        Ok(Message::Close(_)) => break,
                        Ok(_) => continue,
                        Err(e) => LinkEvent::Errored(e.to_string()),
                    };
                    let errored = matches!(event, LinkEvent::Errored(_));
                    if inbound_tx.send(event).await.is_err() || errored {
                        return;
                    }
                }
                let _ = inbound_tx.send(LinkEvent::Closed).await;
            });

            Ok(Link { outbound, inbound })
        }
    }
}
