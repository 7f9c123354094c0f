//! CLI `history` command: newest-first listing of one project.

use anyhow::Result;

use projmem::memory::MemoryEngine;

pub async fn history(
    engine: &MemoryEngine,
    project_id: &str,
    category: Option<&str>,
    count: usize,
    json: bool,
) -> Result<()> {
    let records = engine.get_history(project_id, category, count).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No history for project '{project_id}'.");
        return Ok(());
    }

    for r in &records {
        println!(
            "[{}] {:<16} {}",
            r.timestamp.format("%Y-%m-%d %H:%M"),
            r.category.as_deref().unwrap_or("general"),
            r.text
        );
    }
    Ok(())
}
