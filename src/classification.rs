//! Classifier output as the router consumes it.
//!
//! Links arrive as JSON lines produced by the crawler/classifier:
//!
//! ```json
//! {"url": "https://…", "title": "…", "content": "…",
//!  "classification": {"category": "…", "subcategory": "…", "tags": [], "summary": "…", "key_topics": []}}
//! ```
//!
//! [`ClassifiedLink::into_request`] turns one line into a [`RouteRequest`].

use serde::{Deserialize, Serialize};

use crate::router::RouteRequest;
use crate::topics::similarity::normalize_hints;
use crate::topics::types::{truncate_chars, RoutedDocument};

/// Topic titles derived from a summary are cut to this many characters.
const TITLE_FROM_SUMMARY_CHARS: usize = 100;

/// Structured classification of one link. Fields the router does not use
/// (confidence, difficulty, audience) are ignored on input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl ClassificationResult {
    /// Category, subcategory, then key topics; blanks and case-insensitive
    /// duplicates dropped, first spelling kept.
    pub fn topic_hints(&self) -> Vec<String> {
        let candidates: Vec<&str> = [self.category.as_str(), self.subcategory.as_str()]
            .into_iter()
            .chain(self.key_topics.iter().map(String::as_str))
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .collect();

        let mut seen = Vec::new();
        let mut hints = Vec::new();
        for hint in candidates {
            let key = normalize_hints(&[hint]);
            if key.iter().all(|k| !seen.contains(k)) {
                seen.extend(key);
                hints.push(hint.to_string());
            }
        }
        hints
    }

    /// Summary cut to a title-sized prefix, if there is a summary.
    pub fn title_for_new_topic(&self) -> Option<String> {
        let summary = self.summary.trim();
        if summary.is_empty() {
            return None;
        }
        Some(truncate_chars(summary, TITLE_FROM_SUMMARY_CHARS).trim_end().to_string())
    }
}

/// One input line: a crawled link with its classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedLink {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub classification: Option<ClassificationResult>,
}

impl ClassifiedLink {
    /// Build the routing request. Key topics double as the key insight line.
    pub fn into_request(self) -> RouteRequest {
        let classification = self.classification.unwrap_or_default();

        let mut document = RoutedDocument::new(self.url)
            .with_title(self.title)
            .with_tags(classification.tags.iter().cloned())
            .with_summary(classification.summary.clone())
            .with_body(self.content);
        document.key_topics = classification.key_topics.clone();
        document.key_insight = classification.key_topics.join(", ");
        document.content_type = classification
            .content_type
            .clone()
            .filter(|c| !c.trim().is_empty());

        let mut request = RouteRequest::new(document).with_hints(classification.topic_hints());
        request.title_for_new_topic = classification.title_for_new_topic();
        request
    }
}
