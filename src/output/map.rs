// Topic-map handoff: the ClusterTable as JSON for an external plotter.
//
// Each row carries x, y, cluster, title and url, which is everything a
// scatter plot needs for colour-by-cluster with hover text.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::topics::grouping::ClusterTable;

/// Write the table to `path` as pretty-printed JSON (an array of rows),
/// creating parent directories as needed.
pub fn write_topic_map(table: &ClusterTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(&table.rows).context("Failed to serialize topic map")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    info!(rows = table.len(), path = %path.display(), "Wrote topic map");
    Ok(())
}
