use component_tree::{ComponentKind, ComponentNode, extract_savable, parse_forest};
use proptest::prelude::*;
use serde_json::json;

#[test]
fn card_with_text_and_metric_collapses_to_metric() {
    let forest = parse_forest(vec![json!({
        "kind": "card",
        "title": "Stats",
        "children": [
            {"kind": "metric", "title": "CPU", "value": "40%"},
            {"kind": "text", "content": "hi"}
        ]
    })]);

    let out = extract_savable(&forest);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].component_type, "metric");
    assert_eq!(out[0].title, "CPU");
    assert_eq!(
        out[0].component_data.to_value(),
        json!({"kind": "metric", "title": "CPU", "value": "40%"})
    );
}

#[test]
fn content_slot_children_are_walked() {
    let forest = parse_forest(vec![json!({
        "kind": "collapsible",
        "title": "Build",
        "content": [
            {"kind": "table", "columns": ["step", "ms"]},
            {"kind": "code_block", "title": "log", "code": "ok"}
        ]
    })]);

    let out = extract_savable(&forest);
    let titles: Vec<_> = out.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, ["Build", "log"]);
}

#[test]
fn results_serialize_without_title_source() {
    let forest = parse_forest(vec![json!({"kind": "metric", "title": "CPU"})]);
    let out = extract_savable(&forest);
    let value = serde_json::to_value(&out[0]).unwrap();
    assert_eq!(value["component_type"], "metric");
    assert_eq!(value["title"], "CPU");
    assert!(value.get("title_source").is_none());
}

fn leaf_kinds() -> Vec<ComponentKind> {
    ComponentKind::ALL
        .iter()
        .copied()
        .filter(|k| k.is_savable() && !k.is_container())
        .collect()
}

fn arb_leaf() -> impl Strategy<Value = ComponentNode> {
    let kinds = leaf_kinds();
    (
        proptest::sample::select(kinds),
        proptest::option::of("[a-zA-Z][a-zA-Z0-9 ]{0,12}"),
        proptest::option::of("[a-z0-9]{1,8}"),
    )
        .prop_map(|(kind, title, id)| {
            let mut node = ComponentNode::new(kind.as_str());
            if let Some(title) = title {
                node = node.with_attr("title", title);
            }
            if let Some(id) = id {
                node = node.with_id(id);
            }
            node
        })
}

proptest! {
    #[test]
    fn flat_leaves_extract_unchanged(leaves in proptest::collection::vec(arb_leaf(), 0..12)) {
        let out = extract_savable(&leaves);
        prop_assert_eq!(out.len(), leaves.len());
        for (entry, leaf) in out.iter().zip(&leaves) {
            prop_assert_eq!(&entry.component_data, leaf);
            prop_assert_eq!(&entry.component_type, &leaf.kind);
        }
    }

    #[test]
    fn titled_card_never_leaves_kind_name_titles(
        leaves in proptest::collection::vec(arb_leaf(), 1..8),
    ) {
        let mut card = ComponentNode::new("card").with_attr("title", "Overview");
        card.children = leaves.clone();

        let out = extract_savable(&[card]);
        prop_assert_eq!(out.len(), leaves.len());
        for (entry, leaf) in out.iter().zip(&leaves) {
            match leaf.display_title() {
                Some(own) => prop_assert_eq!(entry.title.as_str(), own),
                None => prop_assert_eq!(entry.title.as_str(), "Overview"),
            }
        }
    }

    #[test]
    fn extraction_never_emits_non_savable_kinds(
        leaves in proptest::collection::vec(arb_leaf(), 0..6),
        wrapper in proptest::sample::select(vec!["row", "column", "tabs", "form"]),
    ) {
        let mut node = ComponentNode::new(wrapper);
        node.children = leaves;
        for entry in extract_savable(&[node]) {
            let kind: ComponentKind = entry.component_type.parse().unwrap();
            prop_assert!(kind.is_savable());
        }
    }
}
