//! Report file output. Stdout carries only the report; logs go to stderr.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;

/// Pretty JSON to `path`, or to stdout when no path is given.
pub fn write_report<T: Serialize>(report: &T, path: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    match path {
        Some(path) => {
            write_file(path, &format!("{json}\n"))?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub fn write_markdown(path: &Path, markdown: &str) -> anyhow::Result<()> {
    write_file(path, markdown)?;
    tracing::info!(path = %path.display(), "Markdown summary written");
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
