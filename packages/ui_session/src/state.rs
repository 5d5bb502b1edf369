//! Session State
//!
//! The aggregate client-visible state, mutated only by [`SessionState::apply`]
//! (one inbound frame at a time) and a few local operations. `apply` performs
//! no I/O: anything that must happen outside the state object (sending a
//! frame, settling a pending save, arming a timer, repainting) comes back as
//! an [`Effect`] for the session loop to carry out.

use component_tree::ComponentNode;
use tracing::{debug, info};

use crate::model::{
    AgentInfo, ChatMessage, ChatSession, ChatStatus, MessageContent, MessageRole, SavedComponent,
};
use crate::protocol::{ClientAction, ServerFrame};

/// Which auto-expiring error text an expiry timer refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSlot {
    Save,
    Combine,
}

/// Where a forest should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// The assistant message at this index of [`SessionState::messages`].
    Message(usize),
    /// The in-place progressive rendering buffer.
    Live,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(ClientAction),
    ResolveSave(SavedComponent),
    RejectSave(String),
    ArmErrorExpiry { slot: ErrorSlot, token: u64 },
    /// The message list was replaced; previously rendered output is stale.
    ResetRender,
    Render(RenderTarget),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct ExpiringError {
    text: Option<String>,
    token: u64,
}

impl ExpiringError {
    fn set(&mut self, text: String) -> u64 {
        self.token += 1;
        self.text = Some(text);
        self.token
    }

    fn clear(&mut self) {
        self.text = None;
    }

    fn expire(&mut self, token: u64) -> bool {
        if self.token == token && self.text.is_some() {
            self.text = None;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    agents: Vec<AgentInfo>,
    status: ChatStatus,
    status_message: Option<String>,
    chats: Vec<ChatSession>,
    active_chat_id: Option<String>,
    messages: Vec<ChatMessage>,
    live: Vec<ComponentNode>,
    saved: Vec<SavedComponent>,
    combining: bool,
    combine_error: ExpiringError,
    save_error: ExpiringError,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agents(&self) -> &[AgentInfo] {
        &self.agents
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn chats(&self) -> &[ChatSession] {
        &self.chats
    }

    pub fn active_chat_id(&self) -> Option<&str> {
        self.active_chat_id.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn live(&self) -> &[ComponentNode] {
        &self.live
    }

    pub fn saved_components(&self) -> &[SavedComponent] {
        &self.saved
    }

    pub fn saved_for_chat<'a>(
        &'a self,
        chat_id: &'a str,
    ) -> impl Iterator<Item = &'a SavedComponent> + 'a {
        self.saved.iter().filter(move |c| c.chat_id == chat_id)
    }

    pub fn is_combining(&self) -> bool {
        self.combining
    }

    pub fn combine_error(&self) -> Option<&str> {
        self.combine_error.text.as_deref()
    }

    pub fn save_error(&self) -> Option<&str> {
        self.save_error.text.as_deref()
    }

    /// Forest at a render target, if it still exists.
    pub fn forest(&self, target: RenderTarget) -> Option<&[ComponentNode]> {
        match target {
            RenderTarget::Live => Some(&self.live),
            RenderTarget::Message(index) => match &self.messages.get(index)?.content {
                MessageContent::Components(forest) => Some(forest),
                MessageContent::Text(_) => None,
            },
        }
    }

    /// Optimistically record a message the user just sent.
    pub fn push_user_message(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    /// An error-expiry timer fired. Stale tokens (the error was replaced
    /// since) are ignored.
    pub fn expire_error(&mut self, slot: ErrorSlot, token: u64) -> bool {
        match slot {
            ErrorSlot::Save => self.save_error.expire(token),
            ErrorSlot::Combine => self.combine_error.expire(token),
        }
    }

    /// Apply one inbound frame.
    pub fn apply(&mut self, frame: ServerFrame) -> Vec<Effect> {
        let mut effects = Vec::new();

        match frame {
            ServerFrame::SystemConfig { agents } => {
                if let Some(agents) = agents {
                    self.agents = agents;
                }
            }
            ServerFrame::AgentRegistered { agent } => {
                if self.agents.iter().any(|a| a.id == agent.id) {
                    debug!(agent = %agent.id, "agent already registered");
                } else {
                    self.agents.push(agent);
                }
            }
            ServerFrame::AgentList { agents } => {
                self.agents = agents;
            }
            ServerFrame::ChatStatus { status, message } => {
                self.status = status;
                self.status_message = message;
            }
            ServerFrame::UiRender { components } => {
                self.messages.push(ChatMessage::assistant(components));
                effects.push(Effect::Render(RenderTarget::Message(self.messages.len() - 1)));
            }
            ServerFrame::UiUpdate { components } => {
                self.live = components;
                effects.push(Effect::Render(RenderTarget::Live));
            }
            ServerFrame::UiAppend { components } => {
                self.live.extend(components);
                effects.push(Effect::Render(RenderTarget::Live));
            }
            ServerFrame::HistoryList { chats } => {
                self.chats = chats;
            }
            ServerFrame::ChatCreated { chat_id } => {
                info!(chat = %chat_id, "chat created");
                self.active_chat_id = Some(chat_id);
                self.messages.clear();
                self.live.clear();
                effects.push(Effect::ResetRender);
                effects.push(Effect::Send(ClientAction::GetHistory));
            }
            ServerFrame::ChatLoaded { chat_id, messages } => {
                info!(chat = %chat_id, messages = messages.len(), "chat loaded");
                self.active_chat_id = Some(chat_id);
                self.messages = messages;
                self.live.clear();
                effects.push(Effect::ResetRender);
                effects.extend(
                    self.messages
                        .iter()
                        .enumerate()
                        .filter(|(_, m)| {
                            m.role == MessageRole::Assistant && !m.content.components().is_empty()
                        })
                        .map(|(index, _)| Effect::Render(RenderTarget::Message(index))),
                );
            }
            ServerFrame::SavedComponentsList { components } => {
                self.saved = components;
            }
            ServerFrame::ComponentSaved { component } => {
                self.saved.retain(|c| c.id != component.id);
                self.saved.insert(0, component.clone());
                self.save_error.clear();
                effects.push(Effect::ResolveSave(component));
            }
            ServerFrame::ComponentDeleted { component_id } => {
                self.saved.retain(|c| c.id != component_id);
            }
            ServerFrame::ComponentSaveError { error } => {
                let token = self.save_error.set(error.clone());
                effects.push(Effect::ArmErrorExpiry {
                    slot: ErrorSlot::Save,
                    token,
                });
                effects.push(Effect::RejectSave(error));
            }
            ServerFrame::CombineStatus { message } => {
                debug!(message = ?message, "combine in progress");
                self.combining = true;
                self.combine_error.clear();
            }
            ServerFrame::ComponentsCombined {
                removed_ids,
                new_components,
            }
            | ServerFrame::ComponentsCondensed {
                removed_ids,
                new_components,
            } => {
                self.combining = false;
                let kept = std::mem::take(&mut self.saved)
                    .into_iter()
                    .filter(|c| !removed_ids.contains(&c.id));
                self.saved = new_components.into_iter().chain(kept).collect();
            }
            ServerFrame::CombineError { error } => {
                self.combining = false;
                let token = self.combine_error.set(error);
                effects.push(Effect::ArmErrorExpiry {
                    slot: ErrorSlot::Combine,
                    token,
                });
            }
            ServerFrame::Unknown { frame_type } => {
                debug!(frame_type = %frame_type, "ignoring unknown frame type");
            }
        }

        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(value: serde_json::Value) -> ServerFrame {
        ServerFrame::parse(&value.to_string()).unwrap()
    }

    fn saved(id: &str, chat: &str) -> serde_json::Value {
        json!({
            "id": id,
            "chat_id": chat,
            "component_data": {"kind": "metric", "title": id},
            "component_type": "metric",
            "title": id
        })
    }

    fn saved_ids(state: &SessionState) -> Vec<&str> {
        state.saved_components().iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_chat_loaded_then_created_is_last_write_wins() {
        let mut state = SessionState::new();
        state.apply(frame(json!({
            "type": "chat_loaded",
            "chat_id": "old",
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": [{"kind": "metric"}]}
            ]
        })));
        assert_eq!(state.messages().len(), 2);

        let effects = state.apply(frame(json!({"type": "chat_created", "chat_id": "new"})));

        assert!(state.messages().is_empty());
        assert_eq!(state.active_chat_id(), Some("new"));
        assert!(effects.contains(&Effect::Send(ClientAction::GetHistory)));
    }

    #[test]
    fn test_chat_loaded_renders_assistant_messages() {
        let mut state = SessionState::new();
        state.apply(frame(json!({"type": "ui_update", "components": [{"kind": "progress"}]})));

        let effects = state.apply(frame(json!({
            "type": "chat_loaded",
            "chat_id": "c1",
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": [{"kind": "metric"}]},
                {"role": "system", "content": "note"}
            ]
        })));

        assert!(state.live().is_empty());
        assert_eq!(
            effects,
            vec![
                Effect::ResetRender,
                Effect::Render(RenderTarget::Message(1))
            ]
        );
        assert_eq!(state.forest(RenderTarget::Message(1)).unwrap().len(), 1);
        assert!(state.forest(RenderTarget::Message(0)).is_none());
    }

    #[test]
    fn test_ui_render_appends_and_keeps_status() {
        let mut state = SessionState::new();
        state.apply(frame(json!({"type": "chat_status", "status": "executing"})));
        let effects =
            state.apply(frame(json!({"type": "ui_render", "components": [{"kind": "table"}]})));

        assert_eq!(state.status(), ChatStatus::Executing);
        assert_eq!(effects, vec![Effect::Render(RenderTarget::Message(0))]);
        assert_eq!(state.messages()[0].role, MessageRole::Assistant);

        state.apply(frame(json!({"type": "chat_status", "status": "done"})));
        assert_eq!(state.status(), ChatStatus::Done);
    }

    #[test]
    fn test_live_buffer_update_and_append() {
        let mut state = SessionState::new();
        state.apply(frame(json!({"type": "ui_update", "components": [{"kind": "progress"}]})));
        state.apply(frame(json!({"type": "ui_append", "components": [{"kind": "text"}]})));
        assert_eq!(state.live().len(), 2);
        assert!(state.messages().is_empty());

        state.apply(frame(json!({"type": "ui_update", "components": [{"kind": "metric"}]})));
        assert_eq!(state.live().len(), 1);
        assert_eq!(state.live()[0].kind, "metric");
    }

    #[test]
    fn test_agent_roster() {
        let mut state = SessionState::new();
        state.apply(frame(json!({"type": "agent_registered", "agent": {"id": "a"}})));
        state.apply(frame(json!({"type": "agent_registered", "agent": {"id": "a"}})));
        state.apply(frame(json!({"type": "agent_registered", "agent": {"id": "b"}})));
        assert_eq!(state.agents().len(), 2);

        // system_config without agents leaves the roster alone
        state.apply(frame(json!({"type": "system_config"})));
        assert_eq!(state.agents().len(), 2);

        state.apply(frame(json!({"type": "system_config", "agents": [{"id": "z"}]})));
        assert_eq!(state.agents().len(), 1);

        state.apply(frame(json!({"type": "agent_list", "agents": []})));
        assert!(state.agents().is_empty());
    }

    #[test]
    fn test_history_list_replaces_chats() {
        let mut state = SessionState::new();
        state.apply(frame(json!({"type": "history_list", "chats": [{"id": "1"}, {"id": "2"}]})));
        state.apply(frame(json!({"type": "history_list", "chats": [{"id": "3"}]})));
        assert_eq!(state.chats().len(), 1);
        assert_eq!(state.chats()[0].id, "3");
    }

    #[test]
    fn test_component_saved_prepends_and_resolves() {
        let mut state = SessionState::new();
        state.apply(frame(json!({
            "type": "saved_components_list",
            "components": [saved("a", "c1"), saved("b", "c2")]
        })));

        let effects = state.apply(frame(json!({"type": "component_saved", "component": saved("n", "c1")})));

        assert_eq!(saved_ids(&state), ["n", "a", "b"]);
        assert!(matches!(&effects[..], [Effect::ResolveSave(c)] if c.id == "n"));
        assert_eq!(state.saved_for_chat("c1").count(), 2);
    }

    #[test]
    fn test_component_saved_replaces_duplicate_id() {
        let mut state = SessionState::new();
        state.apply(frame(json!({"type": "saved_components_list", "components": [saved("a", "c1")]})));
        state.apply(frame(json!({"type": "component_saved", "component": saved("a", "c1")})));
        assert_eq!(saved_ids(&state), ["a"]);
    }

    #[test]
    fn test_history_list_tolerates_loose_server_fields() {
        let mut state = SessionState::new();
        state.apply(frame(json!({
            "type": "history_list",
            "chats": [
                {"id": "1", "title": "Deploys", "updated_at": 1740830400000_i64},
                {"id": "2", "title": null, "updatedAt": "2026-03-01T12:00:00.123456"},
                {"id": "3", "updated_at": "not a date"}
            ]
        })));

        let chats = state.chats();
        assert_eq!(chats.len(), 3);
        assert_eq!(
            chats[0].updated_at.map(|t| t.timestamp_millis()),
            Some(1740830400000)
        );
        assert_eq!(chats[1].title, "");
        assert!(chats[1].updated_at.is_some());
        assert!(chats[2].updated_at.is_none());
    }

    #[test]
    fn test_chat_loaded_keeps_messages_with_unknown_role() {
        let mut state = SessionState::new();
        let effects = state.apply(frame(json!({
            "type": "chat_loaded",
            "chat_id": "c1",
            "messages": [
                {"role": "tool", "content": "ran ls"},
                {"role": "assistant", "content": [{"kind": "metric"}]}
            ]
        })));

        assert_eq!(state.active_chat_id(), Some("c1"));
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[0].role, MessageRole::Unknown);
        assert!(effects.contains(&Effect::Render(RenderTarget::Message(1))));
    }

    #[test]
    fn test_component_saved_with_epoch_created_at_resolves() {
        let mut state = SessionState::new();
        let mut component = saved("n", "c1");
        component["created_at"] = json!(1740830400);
        component["title"] = json!(null);

        let effects = state.apply(frame(json!({"type": "component_saved", "component": component})));

        assert_eq!(saved_ids(&state), ["n"]);
        match &effects[..] {
            [Effect::ResolveSave(c)] => {
                assert_eq!(c.title, "");
                assert_eq!(c.created_at.map(|t| t.timestamp()), Some(1740830400));
            }
            other => panic!("expected a resolved save, got {other:?}"),
        }
    }

    #[test]
    fn test_component_deleted() {
        let mut state = SessionState::new();
        state.apply(frame(json!({
            "type": "saved_components_list",
            "components": [saved("a", "c1"), saved("b", "c1")]
        })));
        state.apply(frame(json!({"type": "component_deleted", "component_id": "a"})));
        assert_eq!(saved_ids(&state), ["b"]);
    }

    #[test]
    fn test_component_save_error_rejects_and_expires() {
        let mut state = SessionState::new();
        let effects = state.apply(frame(json!({"type": "component_save_error", "error": "too large"})));

        assert_eq!(state.save_error(), Some("too large"));
        assert!(effects.contains(&Effect::RejectSave("too large".to_string())));
        let token = effects
            .iter()
            .find_map(|e| match e {
                Effect::ArmErrorExpiry {
                    slot: ErrorSlot::Save,
                    token,
                } => Some(*token),
                _ => None,
            })
            .unwrap();

        assert!(state.expire_error(ErrorSlot::Save, token));
        assert_eq!(state.save_error(), None);
    }

    #[test]
    fn test_combine_flow() {
        let mut state = SessionState::new();
        state.apply(frame(json!({
            "type": "saved_components_list",
            "components": [saved("a", "c1"), saved("b", "c1"), saved("c", "c1")]
        })));

        state.apply(frame(json!({"type": "combine_status", "message": "merging"})));
        assert!(state.is_combining());

        state.apply(frame(json!({
            "type": "components_combined",
            "removed_ids": ["a", "c"],
            "new_components": [saved("ac", "c1")]
        })));
        assert!(!state.is_combining());
        assert_eq!(saved_ids(&state), ["ac", "b"]);
    }

    #[test]
    fn test_condense_prepends_in_order() {
        let mut state = SessionState::new();
        state.apply(frame(json!({
            "type": "saved_components_list",
            "components": [saved("a", "c1"), saved("b", "c1"), saved("x", "c2")]
        })));
        state.apply(frame(json!({
            "type": "components_condensed",
            "removed_ids": ["a", "b"],
            "new_components": [saved("n1", "c1"), saved("n2", "c1")]
        })));
        assert_eq!(saved_ids(&state), ["n1", "n2", "x"]);
    }

    #[test]
    fn test_combine_error_stale_expiry_keeps_newer_error() {
        let mut state = SessionState::new();
        state.apply(frame(json!({"type": "combine_status"})));
        let first = state.apply(frame(json!({"type": "combine_error", "error": "first"})));
        let second = state.apply(frame(json!({"type": "combine_error", "error": "second"})));
        assert!(!state.is_combining());

        let token_of = |effects: &[Effect]| match effects {
            [Effect::ArmErrorExpiry { token, .. }] => *token,
            other => panic!("unexpected effects {other:?}"),
        };

        assert!(!state.expire_error(ErrorSlot::Combine, token_of(&first)));
        assert_eq!(state.combine_error(), Some("second"));
        assert!(state.expire_error(ErrorSlot::Combine, token_of(&second)));
        assert_eq!(state.combine_error(), None);
    }

    #[test]
    fn test_combine_status_clears_error() {
        let mut state = SessionState::new();
        state.apply(frame(json!({"type": "combine_error", "error": "boom"})));
        state.apply(frame(json!({"type": "combine_status"})));
        assert_eq!(state.combine_error(), None);
        assert!(state.is_combining());
    }

    #[test]
    fn test_unknown_frame_is_ignored() {
        let mut state = SessionState::new();
        let before = state.clone();
        let effects = state.apply(frame(json!({"type": "heartbeat"})));
        assert!(effects.is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_push_user_message() {
        let mut state = SessionState::new();
        state.push_user_message("deploy it");
        assert_eq!(state.messages()[0].content.as_text(), Some("deploy it"));
    }
}
