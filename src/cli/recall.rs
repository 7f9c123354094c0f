//! CLI `recall` command: similarity search within one project.

use anyhow::Result;
use serde::Serialize;

use projmem::memory::MemoryEngine;

#[derive(Debug, Serialize)]
struct RecallHit<'a> {
    id: String,
    score: f64,
    text: &'a str,
    category: Option<&'a str>,
    timestamp: String,
}

pub async fn recall(
    engine: &MemoryEngine,
    project_id: &str,
    query: &str,
    limit: usize,
    min_relevance_score: f64,
    json: bool,
) -> Result<()> {
    let hits = engine
        .recall_scored(project_id, query, limit, min_relevance_score)
        .await?;

    if json {
        let out: Vec<RecallHit<'_>> = hits
            .iter()
            .map(|h| RecallHit {
                id: h.record.id.to_string(),
                score: h.score,
                text: &h.record.text,
                category: h.record.category.as_deref(),
                timestamp: h.record.timestamp.to_rfc3339(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No matches in project '{project_id}' scoring at least {min_relevance_score}.");
        return Ok(());
    }

    for h in &hits {
        println!(
            "{:.3}  [{}] {}  ({})",
            h.score,
            h.record.category.as_deref().unwrap_or("general"),
            h.record.text,
            h.record.timestamp.format("%Y-%m-%d")
        );
    }
    Ok(())
}
