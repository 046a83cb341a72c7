//! Topic store — the durable table of topic centroids.
//!
//! All functions take a `&Connection`, so they work the same on a plain
//! connection (each write commits on its own) and inside a router
//! [`rusqlite::Transaction`] (writes commit together). Centroid and count are
//! always written by a single `UPDATE`, so the pair can never be half-applied.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::topics::similarity::running_mean;
use crate::topics::types::{RouteAction, Topic};
use crate::topics::{bytes_to_embedding, embedding_to_bytes};

const TOPIC_COLUMNS: &str =
    "topic_id, storage_location, centroid, document_count, title, created_at, updated_at";

/// Allocate a new topic identifier (UUID v7, time-sortable).
///
/// The router calls this before writing any content that references the id.
pub fn new_topic_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Create a topic with a freshly allocated id, `centroid = initial_vector`
/// and `document_count = 1`.
pub fn add_topic(
    conn: &Connection,
    storage_location: &str,
    initial_vector: &[f32],
    title: &str,
) -> Result<Topic> {
    insert_topic(conn, &new_topic_id(), storage_location, initial_vector, title)
}

/// Create a topic under an id allocated with [`new_topic_id`].
pub fn insert_topic(
    conn: &Connection,
    topic_id: &str,
    storage_location: &str,
    initial_vector: &[f32],
    title: &str,
) -> Result<Topic> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO topics (topic_id, storage_location, centroid, dimensions, document_count, title, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?6)",
        params![
            topic_id,
            storage_location,
            embedding_to_bytes(initial_vector),
            initial_vector.len() as i64,
            title,
            now,
        ],
    )?;

    tracing::debug!(topic_id, storage_location, "topic inserted");

    Ok(Topic {
        topic_id: topic_id.to_string(),
        storage_location: storage_location.to_string(),
        centroid: initial_vector.to_vec(),
        document_count: 1,
        title: title.to_string(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Look up a topic by id.
pub fn get_topic(conn: &Connection, topic_id: &str) -> Result<Topic> {
    conn.query_row(
        &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE topic_id = ?1"),
        params![topic_id],
        row_to_topic,
    )
    .optional()?
    .ok_or_else(|| Error::TopicNotFound(topic_id.to_string()))
}

/// Look up the topic that owns a topic document.
pub fn get_topic_by_location(conn: &Connection, storage_location: &str) -> Result<Option<Topic>> {
    Ok(conn
        .query_row(
            &format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE storage_location = ?1"),
            params![storage_location],
            row_to_topic,
        )
        .optional()?)
}

/// All topics in insertion order.
pub fn list_topics(conn: &Connection) -> Result<Vec<Topic>> {
    let mut stmt = conn.prepare(&format!("SELECT {TOPIC_COLUMNS} FROM topics ORDER BY rowid"))?;
    let topics = stmt
        .query_map([], row_to_topic)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(topics)
}

/// Number of topics in the store.
pub fn topic_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM topics", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Storage location for a topic, or `None` if the id is unknown.
pub fn get_storage_location(conn: &Connection, topic_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT storage_location FROM topics WHERE topic_id = ?1",
            params![topic_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// Fold `new_vector` into a topic's centroid and bump its document count.
///
/// Returns the updated topic.
pub fn update_centroid(conn: &Connection, topic_id: &str, new_vector: &[f32]) -> Result<Topic> {
    let topic = get_topic(conn, topic_id)?;
    if topic.centroid.len() != new_vector.len() {
        return Err(Error::DimensionMismatch {
            expected: topic.centroid.len(),
            actual: new_vector.len(),
        });
    }

    let centroid = running_mean(&topic.centroid, topic.document_count, new_vector);
    let document_count = topic.document_count + 1;
    let now = chrono::Utc::now().to_rfc3339();

    let rows = conn.execute(
        "UPDATE topics SET centroid = ?1, document_count = ?2, updated_at = ?3 WHERE topic_id = ?4",
        params![embedding_to_bytes(&centroid), document_count as i64, now, topic_id],
    )?;
    if rows == 0 {
        return Err(Error::TopicNotFound(topic_id.to_string()));
    }

    tracing::debug!(topic_id, document_count, "centroid updated");

    Ok(Topic {
        centroid,
        document_count,
        updated_at: now,
        ..topic
    })
}

/// One row of the routing audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingLogEntry {
    pub topic_id: String,
    pub source_id: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_location: Option<String>,
    pub created_at: String,
}

/// Record a routing decision in the audit trail.
pub fn write_routing_log(
    conn: &Connection,
    topic_id: &str,
    source_id: &str,
    action: RouteAction,
    score: Option<f64>,
    entry_location: Option<&str>,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO routing_log (topic_id, source_id, action, score, entry_location, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![topic_id, source_id, action.as_str(), score, entry_location, now],
    )?;
    Ok(())
}

/// Routing decisions for a topic, oldest first.
pub fn routing_history(conn: &Connection, topic_id: &str) -> Result<Vec<RoutingLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT topic_id, source_id, action, score, entry_location, created_at \
         FROM routing_log WHERE topic_id = ?1 ORDER BY id",
    )?;
    let entries = stmt
        .query_map(params![topic_id], |row| {
            Ok(RoutingLogEntry {
                topic_id: row.get(0)?,
                source_id: row.get(1)?,
                action: row.get(2)?,
                score: row.get(3)?,
                entry_location: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

fn row_to_topic(row: &Row<'_>) -> rusqlite::Result<Topic> {
    let blob: Vec<u8> = row.get(2)?;
    let document_count: i64 = row.get(3)?;
    Ok(Topic {
        topic_id: row.get(0)?,
        storage_location: row.get(1)?,
        centroid: bytes_to_embedding(&blob),
        document_count: document_count as u64,
        title: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
