//! Topic documents: one markdown file per topic, grown by appending blocks.
//!
//! A topic document is frontmatter followed by a `# Topic:` heading and one
//! `## [[date]] title` block per routed document. Appends add a block at the
//! end and refresh the `last_updated` frontmatter line; the bytes of earlier
//! blocks are copied through untouched.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::NotesConfig;
use crate::error::{Error, Result};
use crate::notes::{collapse_whitespace, create_unique, replace_atomic, slugify, write_new, yaml_value};
use crate::topics::types::{truncate_chars, RoutedDocument};

const FRONTMATTER_FENCE: &str = "---\n";
const LAST_UPDATED_KEY: &str = "last_updated:";

/// Creates and appends to topic documents under one directory.
#[derive(Debug, Clone)]
pub struct TopicWriter {
    topics_dir: PathBuf,
    slug_max: usize,
    excerpt_chars: usize,
}

impl TopicWriter {
    /// Use `topics_dir`, creating it if needed.
    pub fn new(topics_dir: impl Into<PathBuf>, notes: &NotesConfig) -> Result<Self> {
        let topics_dir = topics_dir.into();
        std::fs::create_dir_all(&topics_dir).map_err(|e| {
            Error::Misconfiguration(format!(
                "cannot create topics directory {}: {e}",
                topics_dir.display()
            ))
        })?;
        Ok(Self {
            topics_dir,
            slug_max: notes.topic_slug_max,
            excerpt_chars: notes.excerpt_chars,
        })
    }

    pub fn topics_dir(&self) -> &Path {
        &self.topics_dir
    }

    /// Absolute path of a storage location.
    pub fn path_of(&self, storage_location: &str) -> PathBuf {
        self.topics_dir.join(storage_location)
    }

    /// Create a topic document with no entries yet. Returns its storage
    /// location (file name relative to the topics directory).
    ///
    /// The file name is `slug(title).md`, or `slug_2.md`, `slug_3.md`, … when
    /// taken. An empty slug falls back to the topic id.
    pub fn create(&self, topic_id: &str, title: &str, tags: &[String]) -> Result<String> {
        let slug = slugify(title, '_', self.slug_max);
        let base = if slug.is_empty() { topic_id } else { slug.as_str() };
        let (path, file) = create_unique(&self.topics_dir, base, "_", ".md")?;

        let now = chrono::Utc::now().to_rfc3339();
        let heading = if title.trim().is_empty() { topic_id } else { title };
        let contents = format!(
            "---\n\
             topic_id: {topic_id}\n\
             created_at: {now}\n\
             last_updated: {now}\n\
             tags: {tags}\n\
             title: {title}\n\
             ---\n\
             \n\
             # Topic: {heading}\n",
            tags = yaml_value(tags),
            title = yaml_value(title),
            heading = collapse_whitespace(heading),
        );

        if let Err(e) = write_new(&path, file, contents.as_bytes()) {
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }

        let location = file_name(&path);
        tracing::debug!(topic_id, location = %location, "topic document created");
        Ok(location)
    }

    /// Append a block for `document` to the end of a topic document.
    ///
    /// `entry_link` is the relative link to the document's canonical entry.
    pub fn append(
        &self,
        storage_location: &str,
        document: &RoutedDocument,
        entry_link: Option<&str>,
    ) -> Result<()> {
        let existing = self.read(storage_location)?;
        let existing = String::from_utf8(existing).map_err(|e| {
            Error::Io(std::io::Error::new(ErrorKind::InvalidData, e.utf8_error()))
        })?;

        let now = chrono::Utc::now().to_rfc3339();
        let mut updated = refresh_last_updated(&existing, &now);
        if !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(&self.render_block(document, entry_link));

        replace_atomic(&self.path_of(storage_location), updated.as_bytes())?;
        tracing::debug!(location = storage_location, source_id = %document.source_id, "topic document appended");
        Ok(())
    }

    /// Raw bytes of a topic document.
    pub fn read(&self, storage_location: &str) -> Result<Vec<u8>> {
        let path = self.path_of(storage_location);
        std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::DocumentNotFound(path),
            _ => Error::Io(e),
        })
    }

    /// Put back bytes captured with [`TopicWriter::read`].
    pub fn restore(&self, storage_location: &str, contents: &[u8]) -> Result<()> {
        replace_atomic(&self.path_of(storage_location), contents)?;
        Ok(())
    }

    /// Delete a topic document. Missing files are not an error.
    pub fn remove(&self, storage_location: &str) -> Result<()> {
        match std::fs::remove_file(self.path_of(storage_location)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn render_block(&self, document: &RoutedDocument, entry_link: Option<&str>) -> String {
        let date = document.created_at.format("%Y-%m-%d");
        let title = collapse_whitespace(document.display_title());

        let mut block = format!("\n## [[{date}]] {title}\n");
        block.push_str(&format!("- **URL:** {}\n", document.source_id));
        if let Some(link) = entry_link {
            block.push_str(&format!("- **Entry:** [{title}]({link})\n"));
        }
        if !document.tags.is_empty() {
            let tags: Vec<String> = document
                .tags
                .iter()
                .map(|t| format!("#{}", t.split_whitespace().collect::<Vec<_>>().join("_")))
                .collect();
            block.push_str(&format!("- **Tags:** {}\n", tags.join(" ")));
        }
        if !document.summary.trim().is_empty() {
            block.push_str(&format!("- **Summary:** {}\n", collapse_whitespace(&document.summary)));
        }
        if !document.key_insight.trim().is_empty() {
            block.push_str(&format!(
                "- **Key Insight:** {}\n",
                collapse_whitespace(&document.key_insight)
            ));
        }
        let excerpt = collapse_whitespace(truncate_chars(&document.body, self.excerpt_chars));
        if !excerpt.is_empty() {
            block.push_str(&format!("- **Excerpt:** > \"{excerpt}\"\n"));
        }
        block
    }
}

/// Rewrite the `last_updated` line inside the leading frontmatter. Everything
/// after the closing fence is returned byte-for-byte.
fn refresh_last_updated(contents: &str, now: &str) -> String {
    let Some(rest) = contents.strip_prefix(FRONTMATTER_FENCE) else {
        return contents.to_string();
    };
    let Some(end) = rest.find("\n---\n") else {
        return contents.to_string();
    };
    let (frontmatter, body) = rest.split_at(end + 1);

    let mut out = String::with_capacity(contents.len() + now.len());
    out.push_str(FRONTMATTER_FENCE);
    for line in frontmatter.split_inclusive('\n') {
        if line.starts_with(LAST_UPDATED_KEY) {
            out.push_str(&format!("{LAST_UPDATED_KEY} {now}\n"));
        } else {
            out.push_str(line);
        }
    }
    out.push_str(body);
    out
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
