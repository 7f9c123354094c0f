//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that wire up the engine and the
//! MCP tool handler into a running server.

use crate::tools::ProjmemTools;
use anyhow::Result;
use projmem::config::ProjmemConfig;
use projmem::memory::MemoryEngine;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Shared setup: build the engine from config.
fn setup_shared_state(config: ProjmemConfig) -> Result<(MemoryEngine, Arc<ProjmemConfig>)> {
    let engine = projmem::open_engine(&config)?;
    tracing::info!(
        backend = %config.storage.backend,
        collection = engine.collection().name(),
        default_project = %config.storage.default_project,
        "memory engine ready"
    );
    Ok((engine, Arc::new(config)))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: ProjmemConfig) -> Result<()> {
    tracing::info!("starting projmem MCP server on stdio");

    let (engine, config) = setup_shared_state(config)?;

    let tools = ProjmemTools::new(engine, config);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP at `http://{host}:{port}/mcp`.
pub async fn serve_http(config: ProjmemConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting projmem MCP server on HTTP");

    let (engine, config) = setup_shared_state(config)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(ProjmemTools::new(engine.clone(), config.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
