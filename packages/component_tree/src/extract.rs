//! Savable-component extraction.
//!
//! Given a rendered forest, decide which nodes land in the saved-component
//! library when the user saves the whole thing. The rule, applied bottom-up:
//!
//! 1. Non-savable nodes are transparent: their savable descendants pass through.
//! 2. A savable *container* with at least one savable descendant collapses away;
//!    its title is inherited by descendants that have no title of their own.
//! 3. Any other savable node is emitted itself. A non-container savable node
//!    additionally passes its savable descendants through after itself; a
//!    container never does (it only reaches this branch when it has none).

use serde::Serialize;

use crate::kind::ComponentKind;
use crate::node::ComponentNode;

/// Where a result's title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    /// The node's own `title`/`label`/`name` attribute.
    Own,
    /// Inherited from an enclosing, collapsed container.
    Container,
    /// Nothing better was available; the kind name is used.
    KindName,
}

/// One entry eligible for persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavableComponent {
    pub component_data: ComponentNode,
    pub component_type: String,
    pub title: String,
    #[serde(skip)]
    pub title_source: TitleSource,
}

impl SavableComponent {
    fn from_node(node: &ComponentNode, kind: ComponentKind) -> Self {
        let (title, title_source) = match node.display_title() {
            Some(title) => (title.to_string(), TitleSource::Own),
            None => (kind.as_str().to_string(), TitleSource::KindName),
        };
        Self {
            component_data: node.clone(),
            component_type: kind.as_str().to_string(),
            title,
            title_source,
        }
    }

    pub fn has_distinct_title(&self) -> bool {
        self.title_source != TitleSource::KindName
    }
}

/// Walk a forest and return the savable entries in document order.
pub fn extract_savable(forest: &[ComponentNode]) -> Vec<SavableComponent> {
    forest.iter().flat_map(extract_node).collect()
}

fn extract_node(node: &ComponentNode) -> Vec<SavableComponent> {
    let nested: Vec<SavableComponent> = node.children.iter().flat_map(extract_node).collect();

    let Some(kind) = node.catalog_kind().filter(ComponentKind::is_savable) else {
        return nested;
    };

    if kind.is_container() && !nested.is_empty() {
        let Some(container_title) = node.display_title() else {
            return nested;
        };
        return nested
            .into_iter()
            .map(|mut entry| {
                if !entry.has_distinct_title() {
                    entry.title = container_title.to_string();
                    entry.title_source = TitleSource::Container;
                }
                entry
            })
            .collect();
    }

    let mut out = Vec::with_capacity(1 + nested.len());
    out.push(SavableComponent::from_node(node, kind));
    if !kind.is_container() {
        out.extend(nested);
    }
    out
}
