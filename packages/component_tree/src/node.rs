use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::kind::ComponentKind;

/// Which attribute key held the children on the wire.
///
/// The server nests children under `children` for most kinds and under
/// `content` for some; both are the same slot. The original key is kept so a
/// node serializes back the way it arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildSlot {
    #[default]
    Children,
    Content,
}

impl ChildSlot {
    pub fn key(&self) -> &'static str {
        match self {
            ChildSlot::Children => "children",
            ChildSlot::Content => "content",
        }
    }
}

/// One node of a server-driven UI tree.
///
/// Wire shape is a flat JSON object: `{"kind": "...", "id": "...", ...attributes}`
/// with children inlined under `children` or `content`. `type` is accepted as
/// an alias for `kind`. Attributes stay weakly typed; use the accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentNode {
    pub kind: String,
    pub id: Option<String>,
    pub attributes: Map<String, Value>,
    pub children: Vec<ComponentNode>,
    pub slot: ChildSlot,
}

impl ComponentNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            attributes: Map::new(),
            children: Vec::new(),
            slot: ChildSlot::Children,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: ComponentNode) -> Self {
        self.children.push(child);
        self
    }

    /// Build a node from an arbitrary JSON value.
    ///
    /// Returns `None` if the value is not an object or carries no string
    /// `kind`/`type`. Children that fail the same test are skipped. Unknown
    /// kinds are kept here; catalog filtering is [`parse_forest`]'s job.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };

        // A `kind` that is not a string does not shadow a usable `type`.
        let kind = match map.remove("kind") {
            Some(Value::String(kind)) => kind,
            _ => match map.remove("type") {
                Some(Value::String(kind)) => kind,
                _ => return None,
            },
        };
        let id = match map.remove("id") {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) if !other.is_null() => {
                map.insert("id".to_string(), other);
                None
            }
            _ => None,
        };

        let mut children = Vec::new();
        let mut slot = ChildSlot::Children;
        if let Some(value) = map.remove("children") {
            match value {
                Value::Array(items) => children.extend(items.into_iter().filter_map(Self::from_value)),
                Value::Null => {}
                other => {
                    map.insert("children".to_string(), other);
                }
            }
        }
        // `content` is a child slot only when it holds a list; a string
        // `content` is an ordinary attribute (e.g. the body of a text node).
        if matches!(map.get("content"), Some(Value::Array(_))) {
            if children.is_empty() {
                slot = ChildSlot::Content;
            }
            if let Some(Value::Array(items)) = map.remove("content") {
                children.extend(items.into_iter().filter_map(Self::from_value));
            }
        }

        Some(Self {
            kind,
            id,
            attributes: map,
            children,
            slot,
        })
    }

    pub fn to_value(&self) -> Value {
        // Serializing a Map-backed struct cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Catalog lookup; `None` for kinds outside the catalog.
    pub fn catalog_kind(&self) -> Option<ComponentKind> {
        self.kind.parse().ok()
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// A non-empty string attribute.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.attr_str("title")
    }

    /// `title`, then `label`, then `name`.
    pub fn display_title(&self) -> Option<&str> {
        self.title()
            .or_else(|| self.attr_str("label"))
            .or_else(|| self.attr_str("name"))
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ComponentNode::node_count).sum::<usize>()
    }

    /// Recursively drop children whose kind is not in the catalog.
    pub fn retain_known(&mut self) {
        self.children.retain(|child| {
            let known = child.catalog_kind().is_some();
            if !known {
                debug!(kind = %child.kind, "dropping unknown component kind");
            }
            known
        });
        for child in &mut self.children {
            child.retain_known();
        }
    }
}

/// Parse a forest received from the server.
///
/// Malformed entries and nodes of unknown kind (with their subtrees) are
/// dropped without error.
pub fn parse_forest(values: Vec<Value>) -> Vec<ComponentNode> {
    values
        .into_iter()
        .filter_map(|value| {
            let node = ComponentNode::from_value(value);
            if node.is_none() {
                debug!("dropping malformed component entry");
            }
            node
        })
        .filter_map(|mut node| {
            if node.catalog_kind().is_none() {
                debug!(kind = %node.kind, "dropping unknown component kind");
                return None;
            }
            node.retain_known();
            Some(node)
        })
        .collect()
}

/// `deserialize_with` helper for forest-valued fields.
pub fn deserialize_forest<'de, D>(deserializer: D) -> Result<Vec<ComponentNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => parse_forest(items),
        Some(single @ Value::Object(_)) => parse_forest(vec![single]),
        _ => Vec::new(),
    })
}

impl Serialize for ComponentNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("kind", &self.kind)?;
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        for (key, value) in &self.attributes {
            map.serialize_entry(key, value)?;
        }
        if !self.children.is_empty() {
            map.serialize_entry(self.slot.key(), &self.children)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ComponentNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        ComponentNode::from_value(value)
            .ok_or_else(|| de::Error::custom("component must be an object with a string `kind`"))
    }
}
