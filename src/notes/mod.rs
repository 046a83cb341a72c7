//! Markdown notes: topic documents and canonical per-document entries.
//!
//! Shared helpers for slugs, frontmatter values, and crash-safe file writes
//! live here; the two writers are in [`topic_writer`] and [`entry_writer`].

pub mod entry_writer;
pub mod topic_writer;

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Convert text to a filesystem-safe slug.
///
/// Lowercases, replaces every run of non `[a-z0-9]` characters with `sep`,
/// trims `sep` from both ends, and cuts the result at `max_len` bytes.
pub fn slugify(text: &str, sep: char, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len().min(max_len));
    let mut pending_sep = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !slug.is_empty() {
                slug.push(sep);
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
        if slug.len() >= max_len {
            break;
        }
    }
    slug.truncate(max_len);
    slug.trim_end_matches(sep).to_string()
}

/// Render a frontmatter scalar or list as JSON, which is also valid YAML and
/// survives `:`, quotes, and newlines in titles.
pub(crate) fn yaml_value(value: impl serde::Serialize) -> String {
    serde_json::to_string(&value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Collapse all whitespace runs to single spaces.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Create `dir/{base}{ext}`, or `dir/{base}{sep}{n}{ext}` for n = 2, 3, …
/// when the name is taken. The file is opened with `create_new`, so an
/// existing file is never truncated.
pub(crate) fn create_unique(
    dir: &Path,
    base: &str,
    sep: &str,
    ext: &str,
) -> std::io::Result<(PathBuf, File)> {
    let mut counter = 1u32;
    loop {
        let name = if counter == 1 {
            format!("{base}{ext}")
        } else {
            format!("{base}{sep}{counter}{ext}")
        };
        let path = dir.join(&name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Write `contents` into a freshly created file and make it durable.
pub(crate) fn write_new(path: &Path, mut file: File, contents: &[u8]) -> std::io::Result<()> {
    file.write_all(contents)?;
    file.sync_all()?;
    if let Some(parent) = path.parent() {
        sync_dir(parent)?;
    }
    Ok(())
}

/// Replace `path` with `contents` atomically: write a temp sibling, fsync,
/// rename over the target. A crash leaves either the old or the new file.
pub(crate) fn replace_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("md.tmp");
    let result = (|| {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(contents)?;
        tmp.sync_all()?;
        drop(tmp);
        std::fs::rename(&tmp_path, path)
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result?;
    if let Some(parent) = path.parent() {
        sync_dir(parent)?;
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
