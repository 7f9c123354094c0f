//! MCP `get_project_history` tool parameters and reply text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use projmem::memory::MemoryRecord;

/// Reply when the project has no matching records.
pub const NO_HISTORY: &str = "No previous history for this project.";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetProjectHistoryParams {
    #[schemars(
        description = "Exact category to list: tech_stack, methodology, sprint_planning, etc. Omit for all categories."
    )]
    pub category: Option<String>,

    #[schemars(description = "Number of history entries to return. Defaults to 5.")]
    pub count: Option<usize>,

    #[schemars(description = "Project to read. Defaults to the server's default project.")]
    pub project_id: Option<String>,
}

/// Header naming the category, then one timestamped bullet per record, newest first.
pub fn format_history(category: Option<&str>, records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return NO_HISTORY.to_string();
    }
    let label = match category.filter(|c| !c.trim().is_empty()) {
        Some(c) => format!("History of {c}"),
        None => "General history".to_string(),
    };
    let lines: Vec<String> = records
        .iter()
        .map(|m| format!("  • [{}] {}", m.timestamp.format("%Y-%m-%d %H:%M"), m.text))
        .collect();
    format!("{label}:\n{}", lines.join("\n"))
}
