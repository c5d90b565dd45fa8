use std::fs::OpenOptions;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use anyhow::Context as _;
use serde_json::Value;

use crate::post::normalize;

/// Writes every valid record as one JSON object per line and returns how many were
/// written. Invalid records are left out.
pub fn write_normalized_jsonl(raw_records: &[Value], out_path: &Path) -> anyhow::Result<usize> {
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create jsonl output dir: {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(out_path)
        .with_context(|| format!("create jsonl: {}", out_path.display()))?;
    let mut out = BufWriter::new(file);

    let mut written = 0_usize;
    for post in raw_records.iter().filter_map(|raw| normalize(raw).ok()) {
        serde_json::to_writer(&mut out, &post).context("serialize normalized post")?;
        out.write_all(b"\n").context("write jsonl newline")?;
        written += 1;
    }
    out.flush()
        .with_context(|| format!("flush jsonl: {}", out_path.display()))?;

    Ok(written)
}
