use anyhow::Result;

use projmem::memory::MemoryEngine;

/// Save one piece of project information and print the new record id.
pub async fn save(
    engine: &MemoryEngine,
    project_id: &str,
    text: &str,
    category: Option<&str>,
    sprint_number: Option<&str>,
) -> Result<()> {
    let id = engine.save(project_id, text, category, sprint_number).await?;
    println!("{id}");
    eprintln!("Saved to project '{project_id}'.");
    Ok(())
}
