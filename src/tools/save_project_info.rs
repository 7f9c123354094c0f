//! MCP `save_project_info` tool parameters and reply text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SaveProjectInfoParams {
    #[schemars(description = "The project information to remember, in natural language")]
    pub information: String,

    #[schemars(
        description = "Category: tech_stack, methodology, standards, decision, sprint_planning, estimation, user_story"
    )]
    pub category: Option<String>,

    #[schemars(description = "Sprint number, if applicable (e.g. 'Sprint 3')")]
    pub sprint_number: Option<String>,

    #[schemars(description = "Project to save into. Defaults to the server's default project.")]
    pub project_id: Option<String>,
}

pub fn format_saved(information: &str) -> String {
    format!("Saved: {information}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_accept_minimal_input() {
        let p: SaveProjectInfoParams =
            serde_json::from_str(r#"{"information": "We use Scrum"}"#).unwrap();
        assert_eq!(p.information, "We use Scrum");
        assert!(p.category.is_none());
        assert!(p.project_id.is_none());
    }

    #[test]
    fn saved_echoes_information() {
        assert_eq!(format_saved("We use Scrum"), "Saved: We use Scrum");
    }
}
