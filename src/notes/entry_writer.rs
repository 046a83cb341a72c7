//! Canonical entries — one immutable markdown note per routed document.
//!
//! Entries are written exactly once under `<links>/<YYYY>/` and never updated.
//! File names are `<date>-<slug>-<hash>.md`, where the hash is the first ten
//! hex digits of SHA-256 over the source id.

use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::NotesConfig;
use crate::error::{Error, Result};
use crate::notes::{collapse_whitespace, create_unique, slugify, write_new, yaml_value};
use crate::topics::types::{truncate_chars, RoutedDocument};

const SHORT_HASH_LEN: usize = 10;

/// Where a canonical entry landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLocation {
    /// Absolute path of the entry file.
    pub path: PathBuf,
    /// Path relative to the links directory, `/`-separated.
    pub relative: String,
}

/// Writes canonical entries under one links directory.
#[derive(Debug, Clone)]
pub struct EntryWriter {
    links_dir: PathBuf,
    slug_max: usize,
    max_chars: usize,
}

impl EntryWriter {
    /// Use `links_dir`, creating it if needed.
    pub fn new(links_dir: impl Into<PathBuf>, notes: &NotesConfig) -> Result<Self> {
        let links_dir = links_dir.into();
        std::fs::create_dir_all(&links_dir).map_err(|e| {
            Error::Misconfiguration(format!(
                "cannot create links directory {}: {e}",
                links_dir.display()
            ))
        })?;
        Ok(Self {
            links_dir,
            slug_max: notes.entry_slug_max,
            max_chars: notes.entry_max_chars,
        })
    }

    pub fn links_dir(&self) -> &Path {
        &self.links_dir
    }

    /// Write the canonical entry for `document`, linked to its topic.
    pub fn write(
        &self,
        document: &RoutedDocument,
        topic_id: &str,
        topic_location: &str,
    ) -> Result<EntryLocation> {
        let year = document.created_at.format("%Y").to_string();
        let year_dir = self.links_dir.join(&year);
        std::fs::create_dir_all(&year_dir)?;

        let slug = slugify(document.display_title(), '-', self.slug_max);
        let base = format!(
            "{}-{}-{}",
            document.created_at.format("%Y-%m-%d"),
            if slug.is_empty() { "link" } else { slug.as_str() },
            short_hash(&document.source_id),
        );
        let (path, file) = create_unique(&year_dir, &base, "-", ".md")?;

        let contents = self.render(document, topic_id, topic_location);
        if let Err(e) = write_new(&path, file, contents.as_bytes()) {
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = format!("{year}/{file_name}");
        tracing::debug!(entry = %relative, source_id = %document.source_id, "canonical entry written");

        Ok(EntryLocation { path, relative })
    }

    /// Delete an entry written during a routing attempt that did not commit.
    pub(crate) fn discard(&self, entry: &EntryLocation) -> Result<()> {
        match std::fs::remove_file(&entry.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn render(&self, document: &RoutedDocument, topic_id: &str, topic_location: &str) -> String {
        let content = truncate_chars(&document.body, self.max_chars);
        let truncated = content.len() < document.body.len();
        let title = document.display_title();

        let mut out = String::with_capacity(content.len() + 1024);
        out.push_str("---\n");
        out.push_str(&format!("source_id: {}\n", yaml_value(&document.source_id)));
        out.push_str(&format!("title: {}\n", yaml_value(&document.title)));
        out.push_str(&format!("added_at: {}\n", document.created_at.to_rfc3339()));
        out.push_str(&format!("written_at: {}\n", chrono::Utc::now().to_rfc3339()));
        out.push_str(&format!(
            "content_type: {}\n",
            yaml_value(document.content_type.as_deref().unwrap_or(""))
        ));
        out.push_str(&format!("topic_id: {topic_id}\n"));
        out.push_str(&format!("topic_file: {}\n", yaml_value(topic_location)));
        out.push_str(&format!("tags: {}\n", yaml_value(&document.tags)));
        out.push_str(&format!("key_topics: {}\n", yaml_value(&document.key_topics)));
        out.push_str(&format!("content_truncated: {truncated}\n"));
        out.push_str("---\n\n");

        out.push_str(&format!("# {}\n\n", collapse_whitespace(title)));
        if !document.summary.trim().is_empty() {
            out.push_str(&format!("## Summary\n\n{}\n\n", document.summary.trim()));
        }
        if !document.key_insight.trim().is_empty() {
            out.push_str(&format!("## Key Insight\n\n{}\n\n", document.key_insight.trim()));
        }
        out.push_str("## Content\n\n");
        out.push_str(content.trim());
        out.push('\n');
        out
    }
}

/// First ten hex digits of SHA-256 over `source_id`.
pub fn short_hash(source_id: &str) -> String {
    let digest = Sha256::digest(source_id.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(SHORT_HASH_LEN);
    hex
}
