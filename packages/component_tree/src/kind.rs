//! The fixed catalog of component kinds the client knows how to display.
//!
//! Anything the server sends outside this catalog is dropped from rendered
//! forests (see [`crate::parse_forest`]). Two orthogonal properties hang off
//! each kind: whether it may be persisted into the saved-component library,
//! and whether its primary role is grouping other components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown component kind: {0}")]
pub struct UnknownKind(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    // Grouping
    Container,
    Card,
    Grid,
    Collapsible,
    Row,
    Column,
    Tabs,
    Tab,

    // Content
    Text,
    Heading,
    Markdown,
    CodeBlock,
    Metric,
    Table,
    List,
    KeyValue,
    Timeline,
    Chart,
    LineChart,
    BarChart,
    PieChart,
    Progress,
    Alert,
    Badge,
    Image,
    Divider,

    // Interactive
    Button,
    Input,
    Form,
}

impl ComponentKind {
    pub const ALL: &'static [ComponentKind] = &[
        ComponentKind::Container,
        ComponentKind::Card,
        ComponentKind::Grid,
        ComponentKind::Collapsible,
        ComponentKind::Row,
        ComponentKind::Column,
        ComponentKind::Tabs,
        ComponentKind::Tab,
        ComponentKind::Text,
        ComponentKind::Heading,
        ComponentKind::Markdown,
        ComponentKind::CodeBlock,
        ComponentKind::Metric,
        ComponentKind::Table,
        ComponentKind::List,
        ComponentKind::KeyValue,
        ComponentKind::Timeline,
        ComponentKind::Chart,
        ComponentKind::LineChart,
        ComponentKind::BarChart,
        ComponentKind::PieChart,
        ComponentKind::Progress,
        ComponentKind::Alert,
        ComponentKind::Badge,
        ComponentKind::Image,
        ComponentKind::Divider,
        ComponentKind::Button,
        ComponentKind::Input,
        ComponentKind::Form,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Container => "container",
            ComponentKind::Card => "card",
            ComponentKind::Grid => "grid",
            ComponentKind::Collapsible => "collapsible",
            ComponentKind::Row => "row",
            ComponentKind::Column => "column",
            ComponentKind::Tabs => "tabs",
            ComponentKind::Tab => "tab",
            ComponentKind::Text => "text",
            ComponentKind::Heading => "heading",
            ComponentKind::Markdown => "markdown",
            ComponentKind::CodeBlock => "code_block",
            ComponentKind::Metric => "metric",
            ComponentKind::Table => "table",
            ComponentKind::List => "list",
            ComponentKind::KeyValue => "key_value",
            ComponentKind::Timeline => "timeline",
            ComponentKind::Chart => "chart",
            ComponentKind::LineChart => "line_chart",
            ComponentKind::BarChart => "bar_chart",
            ComponentKind::PieChart => "pie_chart",
            ComponentKind::Progress => "progress",
            ComponentKind::Alert => "alert",
            ComponentKind::Badge => "badge",
            ComponentKind::Image => "image",
            ComponentKind::Divider => "divider",
            ComponentKind::Button => "button",
            ComponentKind::Input => "input",
            ComponentKind::Form => "form",
        }
    }

    /// Kinds whose primary role is grouping children. Only savable kinds
    /// qualify; layout-only wrappers like `row` are transparent instead.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ComponentKind::Container
                | ComponentKind::Card
                | ComponentKind::Grid
                | ComponentKind::Collapsible
        )
    }

    /// Kinds eligible for the saved-component library.
    pub fn is_savable(&self) -> bool {
        match self {
            ComponentKind::Container
            | ComponentKind::Card
            | ComponentKind::Grid
            | ComponentKind::Collapsible
            | ComponentKind::Markdown
            | ComponentKind::CodeBlock
            | ComponentKind::Metric
            | ComponentKind::Table
            | ComponentKind::List
            | ComponentKind::KeyValue
            | ComponentKind::Timeline
            | ComponentKind::Chart
            | ComponentKind::LineChart
            | ComponentKind::BarChart
            | ComponentKind::PieChart
            | ComponentKind::Progress
            | ComponentKind::Alert
            | ComponentKind::Image => true,
            ComponentKind::Row
            | ComponentKind::Column
            | ComponentKind::Tabs
            | ComponentKind::Tab
            | ComponentKind::Text
            | ComponentKind::Heading
            | ComponentKind::Badge
            | ComponentKind::Divider
            | ComponentKind::Button
            | ComponentKind::Input
            | ComponentKind::Form => false,
        }
    }
}

impl FromStr for ComponentKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
