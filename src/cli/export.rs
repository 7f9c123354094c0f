use anyhow::Result;

use projmem::memory::{Collection, MemoryEngine, MemoryFilter};

/// Write every record of one project to stdout, one JSON object per line, oldest first.
pub async fn export(engine: &MemoryEngine, project_id: &str) -> Result<()> {
    let mut records = engine
        .collection()
        .scan(&MemoryFilter::project(project_id), None)
        .await?;
    records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }

    eprintln!("Exported {} records from project '{project_id}'.", records.len());
    Ok(())
}
