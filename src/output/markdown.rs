//! Markdown summary generation
//!
//! This module renders collected replies, grouped by target, as a markdown
//! document.

use crate::output::{HarvestSummary, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown summary to `output_path`
///
/// # Arguments
///
/// * `summary` - The harvest summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &HarvestSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a harvest summary as markdown
pub fn format_markdown_summary(summary: &HarvestSummary) -> String {
    let mut md = String::new();

    md.push_str("# Reply-Harvest Summary\n\n");

    if let Some(run) = &summary.run {
        md.push_str("## Latest Run\n\n");
        md.push_str(&format!("- **Run ID**: {}\n", run.id));
        md.push_str(&format!("- **Started**: {}\n", run.started_at));
        if let Some(finished) = &run.finished_at {
            md.push_str(&format!("- **Finished**: {}\n", finished));
        }
        if let Some(duration) = summary.duration_seconds {
            md.push_str(&format!("- **Duration**: {} seconds\n", duration));
        }
        md.push_str(&format!("- **Status**: {}\n", run.status.to_db_string()));
        md.push_str(&format!("- **Config Hash**: {}\n\n", run.config_hash));
    }

    md.push_str(&format!(
        "**Total replies**: {} across {} target(s)\n\n",
        summary.total_replies(),
        summary.targets.len()
    ));

    for target in &summary.targets {
        md.push_str(&format!("## {}\n\n", target.target));

        if !target.watermarks.is_empty() {
            for watermark in &target.watermarks {
                md.push_str(&format!(
                    "- `{}`: {} (updated {})\n",
                    watermark.checkpoint_key, watermark.cursor, watermark.updated_at
                ));
            }
            md.push('\n');
        }

        if target.replies.is_empty() {
            md.push_str("No replies collected.\n\n");
            continue;
        }

        md.push_str("| Status | Author | Kind | Text |\n");
        md.push_str("|--------|--------|------|------|\n");
        for reply in &target.replies {
            md.push_str(&format!(
                "| {} | @{} | {} | {} |\n",
                reply.display_id(),
                escape_cell(&reply.author),
                reply.kind,
                escape_cell(&reply.full_text)
            ));
        }
        md.push('\n');
    }

    md
}

/// Keeps a value inside a single table cell
fn escape_cell(value: &str) -> String {
    value
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}
