//! Core routing type definitions.
//!
//! Defines [`Topic`] (a persisted cluster), [`RoutedDocument`] (a classified
//! document on its way into the knowledge base), and [`RouteAction`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A semantic cluster of routed documents, matching the `topics` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// UUID v7 assigned before the topic document is written. Never changes.
    pub topic_id: String,
    /// File name of the topic document, relative to the topics directory.
    pub storage_location: String,
    /// Running mean of every embedding routed into this topic.
    pub centroid: Vec<f32>,
    /// Number of documents folded into `centroid`.
    pub document_count: u64,
    /// Display label, set once at creation.
    pub title: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp of the last centroid update.
    pub updated_at: String,
}

impl Topic {
    /// File stem of the storage location (`rust_async.md` → `rust_async`).
    pub fn location_stem(&self) -> &str {
        std::path::Path::new(&self.storage_location)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.storage_location)
    }
}

/// A crawled link plus its classification, ready to be filed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedDocument {
    /// URL or equivalent source identifier.
    pub source_id: String,
    #[serde(default)]
    pub title: String,
    /// Order is kept for display; matching ignores it.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_insight: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Extracted page text. Truncated before embedding and note writing.
    #[serde(default)]
    pub body: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl RoutedDocument {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: String::new(),
            tags: Vec::new(),
            summary: String::new(),
            key_insight: String::new(),
            key_topics: Vec::new(),
            content_type: None,
            body: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Title used in headings: the document title, or its source id.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.source_id
        } else {
            &self.title
        }
    }
}

/// What the router did with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteAction {
    /// The document seeded a new topic.
    #[serde(rename = "create")]
    Created,
    /// The document joined an existing topic.
    #[serde(rename = "append")]
    Appended,
}

impl RouteAction {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "create",
            Self::Appended => "append",
        }
    }
}

impl std::fmt::Display for RouteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_falls_back_to_source() {
        let doc = RoutedDocument::new("https://example.com/a");
        assert_eq!(doc.display_title(), "https://example.com/a");

        let doc = doc.with_title("Async Rust");
        assert_eq!(doc.display_title(), "Async Rust");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn document_deserializes_with_defaults() {
        let doc: RoutedDocument =
            serde_json::from_str(r#"{"source_id": "https://example.com"}"#).unwrap();
        assert!(doc.tags.is_empty());
        assert!(doc.body.is_empty());
        assert!(doc.content_type.is_none());
    }

    #[test]
    fn location_stem_strips_extension() {
        let topic = Topic {
            topic_id: "t".into(),
            storage_location: "rust_async_2.md".into(),
            centroid: vec![1.0],
            document_count: 1,
            title: "Rust".into(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(topic.location_stem(), "rust_async_2");
    }
}
