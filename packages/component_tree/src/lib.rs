//! # Component Tree
//!
//! The recursive, schema-free UI structure a server sends to the client, and
//! the rules for picking which parts of it are worth persisting.
//!
//! - [`ComponentNode`]: one node; a kind, an optional id, weakly typed
//!   attributes, and children.
//! - [`ComponentKind`]: the fixed catalog. [`parse_forest`] drops anything
//!   outside it.
//! - [`extract_savable`]: the container-collapsing walk that turns a rendered
//!   forest into saved-component candidates.
//!
//! ```
//! use component_tree::{extract_savable, parse_forest};
//! use serde_json::json;
//!
//! let forest = parse_forest(vec![json!({
//!     "kind": "card",
//!     "title": "Stats",
//!     "children": [
//!         {"kind": "metric", "title": "CPU", "value": "40%"},
//!         {"kind": "text", "content": "hi"}
//!     ]
//! })]);
//!
//! let saved = extract_savable(&forest);
//! assert_eq!(saved.len(), 1);
//! assert_eq!(saved[0].component_type, "metric");
//! assert_eq!(saved[0].title, "CPU");
//! ```

mod extract;
mod kind;
mod node;

pub use extract::{SavableComponent, TitleSource, extract_savable};
pub use kind::{ComponentKind, UnknownKind};
pub use node::{ChildSlot, ComponentNode, deserialize_forest, parse_forest};
