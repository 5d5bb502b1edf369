//! Session client for server-driven component UIs.
//!
//! A [`SessionClient`] keeps one live WebSocket session with an orchestration
//! service: it registers, resumes the active chat after a reconnect, folds
//! inbound frames into a [`SessionState`] and bridges component saves to
//! their out-of-band confirmations. Rendering and credentials stay outside,
//! behind [`RenderSink`] and [`TokenProvider`].

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod model;
pub mod pending;
pub mod protocol;
pub mod sink;
pub mod state;
pub mod timers;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use client::{ClientHandle, SessionClient};
pub use config::{ClientConfig, FileConfig, Timings, load_config};
pub use connection::{ConnectionState, Connector, Link, LinkEvent};
pub use error::{FrameError, SessionError};
pub use model::{
    AgentInfo, ChatMessage, ChatSession, ChatStatus, MessageContent, MessageRole, SavedComponent,
};
pub use protocol::{ClientAction, Envelope, ServerFrame};
pub use sink::{NullSink, RenderSink, SaveHandle, StaticToken, TokenProvider};
pub use state::{ErrorSlot, RenderTarget, SessionState};
pub use transport::WsConnector;
