use std::fs::OpenOptions;
use std::io::{BufRead as _, BufReader};
use std::path::Path;

use anyhow::Context as _;
use serde_json::Value;

/// Loads the raw records of an export. Only the first line is read; the export is a
/// single-line JSON array.
pub fn load_raw_records(path: &Path) -> anyhow::Result<Vec<Value>> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("open input: {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut first_line = String::new();
    reader
        .read_line(&mut first_line)
        .with_context(|| format!("read input: {}", path.display()))?;

    parse_raw_records(&first_line).with_context(|| format!("parse input: {}", path.display()))
}

pub fn parse_raw_records(line: &str) -> anyhow::Result<Vec<Value>> {
    if line.trim().is_empty() {
        anyhow::bail!("input is empty");
    }

    match serde_json::from_str(line).context("deserialize input json")? {
        Value::Array(records) => Ok(records),
        other => anyhow::bail!("input must be a JSON array, got {}", json_kind(&other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
