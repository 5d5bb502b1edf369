use anyhow::{Context, Result};
use component_tree::{extract_savable, parse_forest};
use serde_json::Value;
use std::path::Path;

/// Run the extraction offline over a JSON file and print the results.
pub fn extract_command(path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let forest = match value {
        Value::Array(items) => parse_forest(items),
        other => parse_forest(vec![other]),
    };
    let results = extract_savable(&forest);

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
