use anyhow::{Context, Result};
use std::path::PathBuf;

use linkmem::config::LinkmemConfig;
use linkmem::topics::store;
use linkmem::topics::types::Topic;

/// List topics in creation order.
pub async fn topics(config: &LinkmemConfig, json: bool) -> Result<()> {
    let topics = load_topics(config.index_path()).await?;

    if json {
        let rows: Vec<_> = topics
            .iter()
            .map(|t| {
                serde_json::json!({
                    "topic_id": t.topic_id,
                    "title": t.title,
                    "storage_location": t.storage_location,
                    "document_count": t.document_count,
                    "updated_at": t.updated_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if topics.is_empty() {
        println!("No topics yet.");
        return Ok(());
    }

    let total: u64 = topics.iter().map(|t| t.document_count).sum();
    println!("Topics ({}, {total} documents)", topics.len());
    println!("{}", "=".repeat(60));
    for t in &topics {
        println!("  {:>5}  {:<40} {}", t.document_count, t.title, t.storage_location);
    }

    Ok(())
}

/// Read every topic on the blocking pool.
async fn load_topics(index_path: PathBuf) -> Result<Vec<Topic>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<Topic>> {
        let conn = linkmem::db::open_database(&index_path)
            .with_context(|| format!("failed to open topic index {}", index_path.display()))?;
        Ok(store::list_topics(&conn)?)
    })
    .await
    .context("topic listing task failed")?
}
