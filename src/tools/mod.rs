pub mod get_project_history;
pub mod recall_project_info;
pub mod save_project_info;

use get_project_history::GetProjectHistoryParams;
use recall_project_info::RecallProjectInfoParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use save_project_info::SaveProjectInfoParams;
use std::sync::Arc;

use projmem::config::ProjmemConfig;
use projmem::memory::MemoryEngine;

/// The projmem MCP tool handler. Holds the engine and config and exposes the three
/// project-memory tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct ProjmemTools {
    tool_router: ToolRouter<Self>,
    engine: MemoryEngine,
    config: Arc<ProjmemConfig>,
}

#[tool_router]
impl ProjmemTools {
    pub fn new(engine: MemoryEngine, config: Arc<ProjmemConfig>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
            config,
        }
    }

    fn project<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.config.storage.default_project)
    }

    /// Save a fact about the project for later recall.
    #[tool(description = "Save important information about the software project (tech stack, decisions, standards, sprint plans).")]
    async fn save_project_info(
        &self,
        Parameters(params): Parameters<SaveProjectInfoParams>,
    ) -> Result<String, String> {
        let project_id = self.project(params.project_id.as_deref());
        tracing::info!(
            project_id,
            content_len = params.information.len(),
            category = params.category.as_deref().unwrap_or("general"),
            "save_project_info called"
        );

        self.engine
            .save(
                project_id,
                &params.information,
                params.category.as_deref(),
                params.sprint_number.as_deref(),
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(save_project_info::format_saved(&params.information))
    }

    /// Semantic lookup of previously saved project information.
    #[tool(description = "Search previously saved project information by meaning. Returns the most relevant entries.")]
    async fn recall_project_info(
        &self,
        Parameters(params): Parameters<RecallProjectInfoParams>,
    ) -> Result<String, String> {
        let project_id = self.project(params.project_id.as_deref());
        tracing::info!(project_id, query = %params.query, "recall_project_info called");

        let records = self
            .engine
            .recall_by_similarity(
                project_id,
                &params.query,
                self.config.tools.recall_limit,
                self.config.tools.min_relevance_score,
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(recall_project_info::format_recall(&records))
    }

    /// Chronological listing, optionally narrowed to one category.
    #[tool(description = "Get the project's chronological history, newest first, optionally filtered by category.")]
    async fn get_project_history(
        &self,
        Parameters(params): Parameters<GetProjectHistoryParams>,
    ) -> Result<String, String> {
        let project_id = self.project(params.project_id.as_deref());
        let count = params.count.unwrap_or(self.config.tools.history_count);
        tracing::info!(
            project_id,
            category = params.category.as_deref().unwrap_or("*"),
            count,
            "get_project_history called"
        );

        let records = self
            .engine
            .get_history(project_id, params.category.as_deref(), count)
            .await
            .map_err(|e| e.to_string())?;

        Ok(get_project_history::format_history(
            params.category.as_deref(),
            &records,
        ))
    }
}

#[tool_handler]
impl ServerHandler for ProjmemTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "projmem remembers facts about software projects. Use save_project_info to \
                 record information, recall_project_info to look it up by meaning, and \
                 get_project_history for a chronological listing."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
