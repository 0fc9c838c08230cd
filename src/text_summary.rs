//! Text summary builder for CLI output.
//!
//! Formats the final session state as human-readable lines for text mode.

use crate::session::SessionState;
use anyhow::{Context, Result};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary of the connection, the loaded artifact and the last download.
pub(crate) fn build_text_summary(state: &SessionState) -> Result<TextSummary> {
    let mut lines = Vec::new();

    lines.push(format!("API: {}", state.connection.label()));
    let status = state.connection.status.as_str();
    if !status.is_empty() && status != "ok" {
        lines.push(format!("Engine status: {status}"));
    }
    if let Some(v) = state.connection.version.as_deref() {
        lines.push(format!("Engine version: {v}"));
    }

    let artifact = state
        .artifact
        .as_ref()
        .context("no artifact loaded; pass --input or --artifact-id")?;

    lines.push(format!("Artifact: {}", artifact.id));
    if let Some(created) = artifact.created_display() {
        lines.push(format!("Created: {created}"));
    }
    if let Some(mode) = artifact.mode.as_deref() {
        lines.push(format!("Mode: {mode}"));
    }
    lines.push("Structured output:".to_string());
    lines.extend(artifact.pretty_output().lines().map(|l| format!("  {l}")));

    if let Some(d) = state.last_download.as_ref() {
        match d.path.as_ref() {
            Some(p) => lines.push(format!("Saved: {}", p.display())),
            None => lines.push(format!("Download: {}", d.url)),
        }
    }

    Ok(TextSummary { lines })
}
