//! Plain-text rendering of component forests.

use component_tree::ComponentNode;
use serde_json::Value;
use std::fmt::Write;

use ui_session::{RenderSink, RenderTarget, SaveHandle};

/// Attributes worth showing inline, in order.
const SUMMARY_ATTRS: &[&str] = &["value", "content", "text", "status"];
const MAX_SUMMARY: usize = 60;

/// Prints every rendered forest to stdout as an indented outline.
#[derive(Debug, Default)]
pub struct OutlineSink;

impl RenderSink for OutlineSink {
    fn render(&mut self, target: RenderTarget, forest: &[ComponentNode], _saver: &SaveHandle) {
        println!("{}\n{}", header(target, forest), outline(forest));
    }

    fn reset(&mut self) {
        println!("--- chat switched ---");
    }
}

fn header(target: RenderTarget, forest: &[ComponentNode]) -> String {
    let nodes: usize = forest.iter().map(ComponentNode::node_count).sum();
    match target {
        RenderTarget::Message(index) => format!("[message {index}] ({nodes} nodes)"),
        RenderTarget::Live => format!("[live] ({nodes} nodes)"),
    }
}

pub fn outline(forest: &[ComponentNode]) -> String {
    let mut out = String::new();
    for node in forest {
        write_node(&mut out, node, 1);
    }
    out
}

fn write_node(out: &mut String, node: &ComponentNode, depth: usize) {
    let _ = write!(out, "{:indent$}{}", "", node.kind, indent = depth * 2);
    if let Some(title) = node.display_title() {
        let _ = write!(out, " \"{title}\"");
    }
    if let Some(summary) = summary(node) {
        let _ = write!(out, " = {summary}");
    }
    out.push('\n');

    for child in &node.children {
        write_node(out, child, depth + 1);
    }
}

fn summary(node: &ComponentNode) -> Option<String> {
    let value = SUMMARY_ATTRS.iter().find_map(|key| node.attr(key))?;
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(_) => return None,
        other => other.to_string(),
    };
    Some(if text.chars().count() > MAX_SUMMARY {
        let cut: String = text.chars().take(MAX_SUMMARY).collect();
        format!("{cut}…")
    } else {
        text
    })
}
