//! Wire protocol types
//!
//! Inbound frames are JSON objects discriminated by `type`. Outbound frames
//! share one envelope: `register_ui` once per connection, then `ui_event`
//! carrying an `action` and a `payload` for everything else.

use component_tree::{ComponentNode, deserialize_forest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::FrameError;
use crate::model::{AgentInfo, ChatMessage, ChatSession, ChatStatus, SavedComponent};

/// Frames sent FROM the server TO the client
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Replaces the agent roster when `agents` is present
    SystemConfig {
        #[serde(default)]
        agents: Option<Vec<AgentInfo>>,
    },
    /// A single agent came online
    AgentRegistered { agent: AgentInfo },
    /// Full agent roster
    AgentList {
        #[serde(default)]
        agents: Vec<AgentInfo>,
    },
    ChatStatus {
        status: ChatStatus,
        #[serde(default)]
        message: Option<String>,
    },
    /// New assistant message
    UiRender {
        #[serde(default, deserialize_with = "deserialize_forest")]
        components: Vec<ComponentNode>,
    },
    /// Replace the live buffer
    UiUpdate {
        #[serde(default, deserialize_with = "deserialize_forest")]
        components: Vec<ComponentNode>,
    },
    /// Append to the live buffer
    UiAppend {
        #[serde(default, deserialize_with = "deserialize_forest")]
        components: Vec<ComponentNode>,
    },
    HistoryList {
        #[serde(default)]
        chats: Vec<ChatSession>,
    },
    ChatCreated {
        #[serde(alias = "chatId")]
        chat_id: String,
    },
    ChatLoaded {
        #[serde(alias = "chatId")]
        chat_id: String,
        #[serde(default)]
        messages: Vec<ChatMessage>,
    },
    SavedComponentsList {
        #[serde(default)]
        components: Vec<SavedComponent>,
    },
    ComponentSaved { component: SavedComponent },
    ComponentDeleted {
        #[serde(alias = "componentId")]
        component_id: String,
    },
    ComponentSaveError {
        #[serde(default)]
        error: String,
    },
    CombineStatus {
        #[serde(default)]
        message: Option<String>,
    },
    ComponentsCombined {
        #[serde(default, alias = "removedIds")]
        removed_ids: Vec<String>,
        #[serde(default, alias = "newComponents")]
        new_components: Vec<SavedComponent>,
    },
    ComponentsCondensed {
        #[serde(default, alias = "removedIds")]
        removed_ids: Vec<String>,
        #[serde(default, alias = "newComponents")]
        new_components: Vec<SavedComponent>,
    },
    CombineError {
        #[serde(default)]
        error: String,
    },
    /// Any `type` this client does not know. Never produced by serde; see
    /// [`ServerFrame::parse`].
    #[serde(skip)]
    Unknown { frame_type: String },
}

impl ServerFrame {
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "system_config",
        "agent_registered",
        "agent_list",
        "chat_status",
        "ui_render",
        "ui_update",
        "ui_append",
        "history_list",
        "chat_created",
        "chat_loaded",
        "saved_components_list",
        "component_saved",
        "component_deleted",
        "component_save_error",
        "combine_status",
        "components_combined",
        "components_condensed",
        "combine_error",
    ];

    /// Parse one inbound text frame.
    ///
    /// Unknown `type`s parse successfully as [`ServerFrame::Unknown`]; a known
    /// `type` with a bad body is an error.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let frame_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingType)?;

        if !Self::KNOWN_TYPES.contains(&frame_type) {
            return Ok(ServerFrame::Unknown {
                frame_type: frame_type.to_string(),
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn frame_type(&self) -> &str {
        match self {
            ServerFrame::SystemConfig { .. } => "system_config",
            ServerFrame::AgentRegistered { .. } => "agent_registered",
            ServerFrame::AgentList { .. } => "agent_list",
            ServerFrame::ChatStatus { .. } => "chat_status",
            ServerFrame::UiRender { .. } => "ui_render",
            ServerFrame::UiUpdate { .. } => "ui_update",
            ServerFrame::UiAppend { .. } => "ui_append",
            ServerFrame::HistoryList { .. } => "history_list",
            ServerFrame::ChatCreated { .. } => "chat_created",
            ServerFrame::ChatLoaded { .. } => "chat_loaded",
            ServerFrame::SavedComponentsList { .. } => "saved_components_list",
            ServerFrame::ComponentSaved { .. } => "component_saved",
            ServerFrame::ComponentDeleted { .. } => "component_deleted",
            ServerFrame::ComponentSaveError { .. } => "component_save_error",
            ServerFrame::CombineStatus { .. } => "combine_status",
            ServerFrame::ComponentsCombined { .. } => "components_combined",
            ServerFrame::ComponentsCondensed { .. } => "components_condensed",
            ServerFrame::CombineError { .. } => "combine_error",
            ServerFrame::Unknown { frame_type } => frame_type,
        }
    }
}

/// Actions multiplexed through the `ui_event` envelope.
///
/// Variants carrying `chat_id: None` are scoped to the active chat by the
/// session loop before sending.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    ChatMessage {
        content: String,
        chat_id: Option<String>,
    },
    LoadChat {
        chat_id: String,
    },
    NewChat,
    GetSavedComponents {
        chat_id: Option<String>,
    },
    SaveComponent {
        chat_id: Option<String>,
        component_data: ComponentNode,
        component_type: String,
        title: Option<String>,
    },
    DeleteSavedComponent {
        component_id: String,
    },
    CombineComponents {
        chat_id: Option<String>,
        component_ids: Vec<String>,
    },
    CondenseComponents {
        chat_id: Option<String>,
    },
    DiscoverAgents,
    GetHistory,
}

impl ClientAction {
    pub fn name(&self) -> &'static str {
        match self {
            ClientAction::ChatMessage { .. } => "chat_message",
            ClientAction::LoadChat { .. } => "load_chat",
            ClientAction::NewChat => "new_chat",
            ClientAction::GetSavedComponents { .. } => "get_saved_components",
            ClientAction::SaveComponent { .. } => "save_component",
            ClientAction::DeleteSavedComponent { .. } => "delete_saved_component",
            ClientAction::CombineComponents { .. } => "combine_components",
            ClientAction::CondenseComponents { .. } => "condense_components",
            ClientAction::DiscoverAgents => "discover_agents",
            ClientAction::GetHistory => "get_history",
        }
    }

    /// Fill an unset chat id with `active`.
    pub fn scoped_to(mut self, active: Option<&str>) -> Self {
        if let ClientAction::ChatMessage { chat_id, .. }
        | ClientAction::GetSavedComponents { chat_id }
        | ClientAction::SaveComponent { chat_id, .. }
        | ClientAction::CombineComponents { chat_id, .. }
        | ClientAction::CondenseComponents { chat_id } = &mut self
        {
            if chat_id.is_none() {
                *chat_id = active.map(str::to_string);
            }
        }
        self
    }

    pub fn payload(&self) -> Value {
        match self {
            ClientAction::ChatMessage { content, chat_id } => {
                json!({ "content": content, "chat_id": chat_id })
            }
            ClientAction::LoadChat { chat_id } => json!({ "chat_id": chat_id }),
            ClientAction::NewChat | ClientAction::DiscoverAgents | ClientAction::GetHistory => {
                json!({})
            }
            ClientAction::GetSavedComponents { chat_id } => json!({ "chat_id": chat_id }),
            ClientAction::SaveComponent {
                chat_id,
                component_data,
                component_type,
                title,
            } => json!({
                "chat_id": chat_id,
                "component_data": component_data,
                "component_type": component_type,
                "title": title,
            }),
            ClientAction::DeleteSavedComponent { component_id } => {
                json!({ "component_id": component_id })
            }
            ClientAction::CombineComponents {
                chat_id,
                component_ids,
            } => json!({ "chat_id": chat_id, "component_ids": component_ids }),
            ClientAction::CondenseComponents { chat_id } => json!({ "chat_id": chat_id }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    UiEvent,
    RegisterUi,
}

/// Frames sent FROM the client TO the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub envelope_type: EnvelopeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
}

impl Envelope {
    pub fn register(session_id: &str, token: &str, capabilities: &[String]) -> Self {
        Self {
            envelope_type: EnvelopeType::RegisterUi,
            action: None,
            session_id: Some(session_id.to_string()),
            payload: json!({}),
            token: Some(token.to_string()),
            capabilities: Some(capabilities.to_vec()),
        }
    }

    pub fn event(action: &ClientAction, session_id: Option<&str>) -> Self {
        Self {
            envelope_type: EnvelopeType::UiEvent,
            action: Some(action.name().to_string()),
            session_id: session_id.map(str::to_string),
            payload: action.payload(),
            token: None,
            capabilities: None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_created() {
        let frame = ServerFrame::parse(r#"{"type":"chat_created","chat_id":"c9"}"#).unwrap();
        assert_eq!(
            frame,
            ServerFrame::ChatCreated {
                chat_id: "c9".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        let frame = ServerFrame::parse(r#"{"type":"telemetry","cpu":3}"#).unwrap();
        assert_eq!(frame.frame_type(), "telemetry");
        assert!(matches!(frame, ServerFrame::Unknown { .. }));
    }

    #[test]
    fn test_parse_missing_type() {
        let err = ServerFrame::parse(r#"{"chat_id":"c9"}"#).unwrap_err();
        assert!(matches!(err, FrameError::MissingType));
    }

    #[test]
    fn test_parse_not_json() {
        let err = ServerFrame::parse("not json").unwrap_err();
        assert!(matches!(err, FrameError::Json(_)));
    }

    #[test]
    fn test_parse_known_type_bad_body() {
        let err = ServerFrame::parse(r#"{"type":"component_deleted"}"#).unwrap_err();
        assert!(matches!(err, FrameError::Json(_)));
    }

    #[test]
    fn test_ui_render_drops_unknown_kinds() {
        let frame = ServerFrame::parse(
            r#"{"type":"ui_render","components":[{"kind":"metric"},{"kind":"nope"}]}"#,
        )
        .unwrap();
        match frame {
            ServerFrame::UiRender { components } => assert_eq!(components.len(), 1),
            other => panic!("Expected UiRender, got {other:?}"),
        }
    }

    #[test]
    fn test_components_combined() {
        let frame = ServerFrame::parse(
            r#"{"type":"components_combined","removed_ids":["a","b"],"new_components":[
                {"id":"c","chat_id":"x","component_data":{"kind":"card"},"component_type":"card","title":"AB"}
            ]}"#,
        )
        .unwrap();
        match frame {
            ServerFrame::ComponentsCombined {
                removed_ids,
                new_components,
            } => {
                assert_eq!(removed_ids, ["a", "b"]);
                assert_eq!(new_components[0].id, "c");
            }
            other => panic!("Expected ComponentsCombined, got {other:?}"),
        }
    }

    #[test]
    fn test_every_known_type_round_trips_frame_type() {
        let samples = [
            r#"{"type":"system_config"}"#,
            r#"{"type":"agent_registered","agent":{"id":"a"}}"#,
            r#"{"type":"agent_list"}"#,
            r#"{"type":"chat_status","status":"thinking"}"#,
            r#"{"type":"ui_render"}"#,
            r#"{"type":"ui_update"}"#,
            r#"{"type":"ui_append"}"#,
            r#"{"type":"history_list"}"#,
            r#"{"type":"chat_created","chat_id":"c"}"#,
            r#"{"type":"chat_loaded","chat_id":"c"}"#,
            r#"{"type":"saved_components_list"}"#,
            r#"{"type":"component_saved","component":{"id":"s","chat_id":"c","component_data":{"kind":"metric"},"component_type":"metric"}}"#,
            r#"{"type":"component_deleted","component_id":"s"}"#,
            r#"{"type":"component_save_error","error":"x"}"#,
            r#"{"type":"combine_status"}"#,
            r#"{"type":"components_combined"}"#,
            r#"{"type":"components_condensed"}"#,
            r#"{"type":"combine_error","error":"x"}"#,
        ];
        assert_eq!(samples.len(), ServerFrame::KNOWN_TYPES.len());
        for (sample, expected) in samples.iter().zip(ServerFrame::KNOWN_TYPES) {
            let frame = ServerFrame::parse(sample).unwrap();
            assert_eq!(frame.frame_type(), *expected);
        }
    }

    #[test]
    fn test_register_envelope_shape() {
        let caps = vec!["ui_render".to_string()];
        let value = serde_json::to_value(Envelope::register("s-1", "tok", &caps)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "register_ui",
                "session_id": "s-1",
                "payload": {},
                "token": "tok",
                "capabilities": ["ui_render"]
            })
        );
    }

    #[test]
    fn test_event_envelope_shape() {
        let action = ClientAction::LoadChat {
            chat_id: "c1".to_string(),
        };
        let value = serde_json::to_value(Envelope::event(&action, Some("s-1"))).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "ui_event",
                "action": "load_chat",
                "session_id": "s-1",
                "payload": {"chat_id": "c1"}
            })
        );
    }

    #[test]
    fn test_unit_actions_carry_empty_payload() {
        for action in [ClientAction::NewChat, ClientAction::DiscoverAgents, ClientAction::GetHistory] {
            assert_eq!(Envelope::event(&action, None).payload, json!({}));
        }
    }

    #[test]
    fn test_scoped_to_fills_only_missing_chat() {
        let scoped = ClientAction::CondenseComponents { chat_id: None }.scoped_to(Some("active"));
        assert_eq!(
            scoped,
            ClientAction::CondenseComponents {
                chat_id: Some("active".to_string())
            }
        );

        let explicit = ClientAction::GetSavedComponents {
            chat_id: Some("other".to_string()),
        }
        .scoped_to(Some("active"));
        assert_eq!(
            explicit,
            ClientAction::GetSavedComponents {
                chat_id: Some("other".to_string())
            }
        );

        assert_eq!(ClientAction::GetHistory.scoped_to(Some("active")), ClientAction::GetHistory);
    }

    #[test]
    fn test_save_component_payload() {
        let action = ClientAction::SaveComponent {
            chat_id: Some("c1".to_string()),
            component_data: ComponentNode::new("metric").with_attr("title", "CPU"),
            component_type: "metric".to_string(),
            title: None,
        };
        let payload = action.payload();
        assert_eq!(payload["component_data"], json!({"kind": "metric", "title": "CPU"}));
        assert_eq!(payload["title"], Value::Null);
    }
}
