use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Error;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LinkmemConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub routing: RoutingConfig,
    pub notes: NotesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub output_dir: String,
    pub topics_subdir: String,
    pub links_subdir: String,
    pub index_file: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub max_input_chars: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoutingConfig {
    /// Minimum combined score for appending to an existing topic.
    pub similarity_threshold: f64,
    /// Prefix of the document body fed into the embedding input.
    pub embed_content_chars: usize,
    pub hint_bonus_per_match: f64,
    pub hint_bonus_cap: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotesConfig {
    /// Per-note content size cap for canonical entries.
    pub entry_max_chars: usize,
    pub excerpt_chars: usize,
    pub topic_slug_max: usize,
    pub entry_slug_max: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let output_dir = default_linkmem_dir()
            .join("memory")
            .to_string_lossy()
            .into_owned();
        Self {
            output_dir,
            topics_subdir: "topics".into(),
            links_subdir: "links".into(),
            index_file: "topic_index.db".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "http".into(),
            model: "openai/text-embedding-3-small".into(),
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key_env: "OPENROUTER_API_KEY".into(),
            max_input_chars: 8000,
            timeout_secs: 60,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            embed_content_chars: 4000,
            hint_bonus_per_match: 0.04,
            hint_bonus_cap: 0.12,
        }
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            entry_max_chars: 120_000,
            excerpt_chars: 200,
            topic_slug_max: 60,
            entry_slug_max: 50,
        }
    }
}

/// Returns `~/.linkmem/`, or `.linkmem/` when no home directory is known.
pub fn default_linkmem_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".linkmem")
}

/// Returns the default config file path: `~/.linkmem/config.toml`
pub fn default_config_path() -> PathBuf {
    default_linkmem_dir().join("config.toml")
}

impl LinkmemConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            LinkmemConfig::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides (LINKMEM_OUTPUT_DIR, LINKMEM_LOG_LEVEL,
    /// LINKMEM_SIMILARITY_THRESHOLD, LINKMEM_EMBEDDING_MODEL).
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("LINKMEM_OUTPUT_DIR") {
            self.storage.output_dir = val;
        }
        if let Ok(val) = std::env::var("LINKMEM_LOG_LEVEL") {
            self.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("LINKMEM_SIMILARITY_THRESHOLD") {
            self.routing.similarity_threshold = val
                .parse()
                .with_context(|| format!("LINKMEM_SIMILARITY_THRESHOLD is not a number: {val}"))?;
        }
        if let Ok(val) = std::env::var("LINKMEM_EMBEDDING_MODEL") {
            self.embedding.model = val;
        }
        Ok(())
    }

    /// Reject settings the router cannot work with.
    pub fn validate(&self) -> Result<(), Error> {
        let routing = &self.routing;
        let threshold = routing.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::Misconfiguration(format!(
                "similarity_threshold must be in (0, 1], got {threshold}"
            )));
        }
        if !(routing.hint_bonus_per_match >= 0.0) || !(routing.hint_bonus_cap >= 0.0) {
            return Err(Error::Misconfiguration(
                "hint bonus parameters must be non-negative".into(),
            ));
        }
        if routing.hint_bonus_cap > 0.5 {
            return Err(Error::Misconfiguration(format!(
                "hint_bonus_cap must not exceed 0.5, got {}",
                routing.hint_bonus_cap
            )));
        }
        if routing.embed_content_chars == 0
            || self.notes.entry_max_chars == 0
            || self.notes.topic_slug_max == 0
            || self.notes.entry_slug_max == 0
        {
            return Err(Error::Misconfiguration(
                "content and slug size caps must be greater than zero".into(),
            ));
        }
        if self.storage.output_dir.trim().is_empty() {
            return Err(Error::Misconfiguration("storage.output_dir is empty".into()));
        }
        for (name, subdir) in [
            ("topics_subdir", &self.storage.topics_subdir),
            ("links_subdir", &self.storage.links_subdir),
        ] {
            if subdir.is_empty() || subdir.contains(['/', '\\']) || subdir == ".." {
                return Err(Error::Misconfiguration(format!(
                    "storage.{name} must be a single directory name, got {subdir:?}"
                )));
            }
        }
        if self.storage.topics_subdir == self.storage.links_subdir {
            return Err(Error::Misconfiguration(
                "topics and links must live in different directories".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the output directory, expanding `~` if needed.
    pub fn resolved_output_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.output_dir)
    }

    pub fn topics_dir(&self) -> PathBuf {
        self.resolved_output_dir().join(&self.storage.topics_subdir)
    }

    pub fn links_dir(&self) -> PathBuf {
        self.resolved_output_dir().join(&self.storage.links_subdir)
    }

    pub fn index_path(&self) -> PathBuf {
        self.resolved_output_dir().join(&self.storage.index_file)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
