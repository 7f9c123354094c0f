//! MCP `recall_project_info` tool parameters and reply text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use projmem::memory::MemoryRecord;

/// Reply when nothing clears the relevance threshold.
pub const NOTHING_RELEVANT: &str = "No relevant information about that topic was found in the project.";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecallProjectInfoParams {
    #[schemars(description = "What do you need to remember about the project?")]
    pub query: String,

    #[schemars(description = "Project to search. Defaults to the server's default project.")]
    pub project_id: Option<String>,
}

/// One bullet per record: text, category (or `general`) and save date.
pub fn format_recall(records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return NOTHING_RELEVANT.to_string();
    }
    let lines: Vec<String> = records
        .iter()
        .map(|m| {
            format!(
                "  • {} [{}] (saved: {})",
                m.text,
                m.category.as_deref().unwrap_or("general"),
                m.timestamp.format("%Y-%m-%d")
            )
        })
        .collect();
    format!("Project information:\n{}", lines.join("\n"))
}
