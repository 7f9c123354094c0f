//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use projmem::config::ProjmemConfig;
use projmem::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &ProjmemConfig) -> Result<()> {
    if config.storage.backend != "sqlite" {
        println!(
            "Storage backend is '{}'; nothing on disk to check.",
            config.storage.backend
        );
        return Ok(());
    }

    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `projmem serve` or `projmem save` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn, &config.storage.collection)
        .context("failed to run health check")?;

    let configured_model = config.embedding.model_name();

    println!("projmem Health Report");
    println!("=====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {configured_model}");
    println!(
        "  Dimensions:      {}",
        report
            .embedding_dim
            .map_or_else(|| "(not set)".to_string(), |d| d.to_string())
    );
    if let Some(ref stored) = report.embedding_model {
        if stored != configured_model {
            println!("  WARNING: model mismatch! Stored vectors will not compare well with new queries.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    println!();
    println!("Collection '{}':", config.storage.collection);
    if report.collection_present {
        println!("  Records:         {}", report.record_count);
        println!("  Projects:        {}", report.project_count);
    } else {
        println!("  (not created yet; it is created on first save)");
    }
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or export each project from a good copy: projmem export --project <id>");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
