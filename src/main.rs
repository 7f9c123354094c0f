mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use projmem::config::ProjmemConfig;

#[derive(Parser)]
#[command(name = "projmem", version, about = "Project memory MCP server for AI assistants")]
struct Cli {
    /// Config file (defaults to ~/.projmem/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport unless --http)
    Serve {
        /// Serve Streamable HTTP on the configured host and port
        #[arg(long)]
        http: bool,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Save a piece of project information
    Save {
        text: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        sprint: Option<String>,
        #[arg(long)]
        project: Option<String>,
    },
    /// Find saved information by meaning
    Recall {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List saved information, newest first
    History {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Export a project's records as JSON lines
    Export {
        #[arg(long)]
        project: Option<String>,
    },
    /// Check database health
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.projmem/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = match &cli.config {
        Some(path) => ProjmemConfig::load_from(path)?,
        None => ProjmemConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let default_project = config.storage.default_project.clone();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
        Command::Save {
            text,
            category,
            sprint,
            project,
        } => {
            let engine = projmem::open_engine(&config)?;
            let project_id = cli::project_or_default(project.as_deref(), &default_project);
            cli::save::save(
                &engine,
                project_id,
                &text,
                category.as_deref(),
                sprint.as_deref(),
            )
            .await?;
        }
        Command::Recall {
            query,
            limit,
            min_score,
            project,
            json,
        } => {
            let engine = projmem::open_engine(&config)?;
            let project_id = cli::project_or_default(project.as_deref(), &default_project);
            cli::recall::recall(
                &engine,
                project_id,
                &query,
                limit.unwrap_or(config.retrieval.recall_limit),
                min_score.unwrap_or(config.retrieval.min_relevance_score),
                json,
            )
            .await?;
        }
        Command::History {
            category,
            count,
            project,
            json,
        } => {
            let engine = projmem::open_engine(&config)?;
            let project_id = cli::project_or_default(project.as_deref(), &default_project);
            cli::history::history(
                &engine,
                project_id,
                category.as_deref(),
                count.unwrap_or(config.retrieval.history_count),
                json,
            )
            .await?;
        }
        Command::Export { project } => {
            let engine = projmem::open_engine(&config)?;
            let project_id = cli::project_or_default(project.as_deref(), &default_project);
            cli::export::export(&engine, project_id).await?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config)?;
        }
    }

    Ok(())
}
