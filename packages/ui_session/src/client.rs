//! The session loop and its handle.
//!
//! One tokio task owns the [`ConnectionManager`], the [`SessionState`], the
//! pending-save slot and the render sink. Caller commands, link events and
//! timers are all funnelled into it, so state is only ever touched from one
//! place and handlers never run concurrently.

use std::sync::Arc;

use component_tree::{ComponentNode, SavableComponent, extract_savable};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, Connector};
use crate::error::SessionError;
use crate::model::SavedComponent;
use crate::pending::{PendingReply, PendingSlot};
use crate::protocol::{ClientAction, ServerFrame};
use crate::sink::{RenderSink, SaveHandle, TokenProvider};
use crate::state::{Effect, SessionState};
use crate::timers::{Event, Scheduler, Timer};

const COMMAND_CAPACITY: usize = 64;

enum Command {
    Connect,
    Disconnect,
    Shutdown,
    Send(ClientAction),
    ChatMessage {
        content: String,
        reply: oneshot::Sender<bool>,
    },
    Save {
        action: ClientAction,
        reply: PendingReply<SavedComponent>,
    },
}

pub struct SessionClient<C, T, S> {
    config: ClientConfig,
    conn: ConnectionManager<C>,
    timers: Scheduler,
    state: SessionState,
    saves: PendingSlot<SavedComponent>,
    tokens: T,
    sink: S,
    saver: SaveHandle,
    state_tx: watch::Sender<SessionState>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl<C, T, S> SessionClient<C, T, S>
where
    C: Connector,
    T: TokenProvider,
    S: RenderSink,
{
    /// Start the session loop on a new task. The client stays idle until
    /// [`ClientHandle::connect`] is called.
    pub fn spawn(config: ClientConfig, connector: C, tokens: T, sink: S) -> ClientHandle {
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, events) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::new());

        let conn = ConnectionManager::new(Arc::new(connector), &config);
        let handle = ClientHandle {
            commands: command_tx,
            state: state_tx.subscribe(),
            connected: conn.subscribe_connected(),
        };

        let client = SessionClient {
            saves: PendingSlot::new(config.timings.save_timeout),
            config,
            conn,
            timers: Scheduler::new(event_tx),
            state: SessionState::new(),
            tokens,
            sink,
            saver: SaveHandle::new(handle.downgrade()),
            state_tx,
            commands,
            events,
        };
        tokio::spawn(client.run());
        handle
    }

    async fn run(mut self) {
        debug!("session loop started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) => break,
                    Some(command) => self.on_command(command),
                    // Every handle is gone.
                    None => break,
                },
                Some(event) = self.events.recv() => self.on_event(event),
            }
        }

        self.conn.disconnect(&mut self.timers);
        self.saves.reject_all(|| SessionError::ClientClosed);
        info!("session loop stopped");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.conn.connect(self.tokens.token(), &self.timers),
            Command::Disconnect => {
                self.conn.disconnect(&mut self.timers);
                self.saves.reject_all(|| SessionError::Disconnected);
            }
            Command::Shutdown => {}
            Command::Send(action) => {
                self.send(action);
            }
            Command::ChatMessage { content, reply } => {
                let sent = self.conn.is_connected();
                if sent {
                    self.state.push_user_message(content.clone());
                    self.send(ClientAction::ChatMessage {
                        content,
                        chat_id: None,
                    });
                    self.publish();
                } else {
                    debug!("not connected, chat message not sent");
                }
                let _ = reply.send(sent);
            }
            Command::Save { action, reply } => {
                if !self.conn.is_connected() {
                    let _ = reply.send(Err(SessionError::Disconnected));
                    return;
                }
                let id = self.saves.register(reply);
                self.timers
                    .schedule(self.saves.timeout(), Timer::SaveDeadline(id));
                self.send(action);
            }
        }
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Connection { generation, event } => {
                let frame = self.conn.handle(
                    generation,
                    event,
                    self.state.active_chat_id(),
                    &self.timers,
                );
                if let Some(text) = frame {
                    self.dispatch(&text);
                }
            }
            Event::Timer(Timer::Reconnect) => {
                self.conn.connect(self.tokens.token(), &self.timers);
            }
            Event::Timer(Timer::Resume {
                generation,
                chat_id,
            }) => self.conn.resume(generation, chat_id),
            Event::Timer(Timer::SaveDeadline(id)) => {
                if self.saves.expire(id) {
                    warn!(request = id, "save confirmation timed out");
                }
            }
            Event::Timer(Timer::ErrorExpiry { slot, token }) => {
                if self.state.expire_error(slot, token) {
                    self.publish();
                }
            }
        }
    }

    fn dispatch(&mut self, text: &str) {
        let frame = match ServerFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                return;
            }
        };
        debug!(frame_type = frame.frame_type(), "frame received");

        for effect in self.state.apply(frame) {
            self.perform(effect);
        }
        self.publish();
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::Send(action) => {
                self.send(action);
            }
            Effect::ResolveSave(component) => {
                if !self.saves.resolve_one(component) {
                    debug!("component saved with no pending request");
                }
            }
            Effect::RejectSave(reason) => {
                self.saves.reject_one(SessionError::Rejected(reason));
            }
            Effect::ArmErrorExpiry { slot, token } => {
                self.timers.schedule_detached(
                    self.config.timings.error_ttl,
                    Timer::ErrorExpiry { slot, token },
                );
            }
            Effect::ResetRender => self.sink.reset(),
            Effect::Render(target) => {
                if let Some(forest) = self.state.forest(target) {
                    self.sink.render(target, forest, &self.saver);
                }
            }
        }
    }

    fn send(&self, action: ClientAction) -> bool {
        let action = action.scoped_to(self.state.active_chat_id());
        self.conn.send(&action)
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

/// Cloneable handle to a running session loop.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
    connected: watch::Receiver<bool>,
}

impl ClientHandle {
    async fn command(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::ClientClosed)
    }

    async fn action(&self, action: ClientAction) -> Result<(), SessionError> {
        self.command(Command::Send(action)).await
    }

    /// Start connecting. A no-op without a credential.
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.command(Command::Connect).await
    }

    /// Close the transport, cancel reconnects and reject any pending save.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.command(Command::Disconnect).await
    }

    /// Stop the session loop.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.command(Command::Shutdown).await
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Send a chat message in the active chat, recording it locally. Returns
    /// false, without recording, when offline.
    pub async fn send_chat_message(&self, content: impl Into<String>) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::ChatMessage {
            content: content.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::ClientClosed)
    }

    pub async fn new_chat(&self) -> Result<(), SessionError> {
        self.action(ClientAction::NewChat).await
    }

    pub async fn load_chat(&self, chat_id: impl Into<String>) -> Result<(), SessionError> {
        self.action(ClientAction::LoadChat {
            chat_id: chat_id.into(),
        })
        .await
    }

    pub async fn request_history(&self) -> Result<(), SessionError> {
        self.action(ClientAction::GetHistory).await
    }

    /// Ask for the saved components of `chat_id`, or of the active chat.
    pub async fn request_saved_components(
        &self,
        chat_id: Option<String>,
    ) -> Result<(), SessionError> {
        self.action(ClientAction::GetSavedComponents { chat_id }).await
    }

    pub async fn delete_saved_component(
        &self,
        component_id: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.action(ClientAction::DeleteSavedComponent {
            component_id: component_id.into(),
        })
        .await
    }

    pub async fn combine_components(&self, component_ids: Vec<String>) -> Result<(), SessionError> {
        self.action(ClientAction::CombineComponents {
            chat_id: None,
            component_ids,
        })
        .await
    }

    pub async fn condense_components(&self) -> Result<(), SessionError> {
        self.action(ClientAction::CondenseComponents { chat_id: None })
            .await
    }

    pub async fn discover_agents(&self) -> Result<(), SessionError> {
        self.action(ClientAction::DiscoverAgents).await
    }

    /// Persist one component and wait for the server's confirmation.
    ///
    /// `Ok(None)` when offline. Only one save can await confirmation at a
    /// time; starting another before this one settles leaves this one to
    /// time out. Use [`ClientHandle::save_all`] for batches.
    pub async fn save_component(
        &self,
        component_data: ComponentNode,
        component_type: &str,
        title: Option<String>,
    ) -> Result<Option<SavedComponent>, SessionError> {
        if !self.is_connected() {
            return Ok(None);
        }
        let (reply, rx) = oneshot::channel();
        self.command(Command::Save {
            action: ClientAction::SaveComponent {
                chat_id: None,
                component_data,
                component_type: component_type.to_string(),
                title,
            },
            reply,
        })
        .await?;
        let saved = rx.await.map_err(|_| SessionError::ClientClosed)??;
        Ok(Some(saved))
    }

    /// Extract every savable component of `forest` and save them one after
    /// another, each waiting for its confirmation. Stops at the first error;
    /// going offline stops early with what was saved so far.
    pub async fn save_all(
        &self,
        forest: &[ComponentNode],
    ) -> Result<Vec<SavedComponent>, SessionError> {
        let mut saved = Vec::new();
        for SavableComponent {
            component_data,
            component_type,
            title,
            ..
        } in extract_savable(forest)
        {
            match self
                .save_component(component_data, &component_type, Some(title))
                .await?
            {
                Some(component) => saved.push(component),
                None => break,
            }
        }
        Ok(saved)
    }

    /// A handle that does not keep the session loop alive.
    pub(crate) fn downgrade(&self) -> WeakClientHandle {
        WeakClientHandle {
            commands: self.commands.downgrade(),
            state: self.state.clone(),
            connected: self.connected.clone(),
        }
    }
}

/// Non-owning [`ClientHandle`], held by the loop itself for the render sink.
#[derive(Clone)]
pub(crate) struct WeakClientHandle {
    commands: mpsc::WeakSender<Command>,
    state: watch::Receiver<SessionState>,
    connected: watch::Receiver<bool>,
}

impl WeakClientHandle {
    /// `None` once every [`ClientHandle`] has been dropped.
    pub(crate) fn upgrade(&self) -> Option<ClientHandle> {
        Some(ClientHandle {
            commands: self.commands.upgrade()?,
            state: self.state.clone(),
            connected: self.connected.clone(),
        })
    }
}
