//! Topic memory for classified links: durable, incrementally clustered notes.
//!
//! linkmem files each classified link into a semantic topic. Topics are
//! discovered online by greedy threshold clustering over embedding vectors:
//! a document joins the most similar existing topic if the score clears the
//! threshold, otherwise it seeds a new one. Every topic keeps a running-mean
//! centroid in SQLite and a markdown document on disk; every link also gets
//! one immutable canonical entry.
//!
//! | Artifact | Location | Mutability |
//! |----------|----------|------------|
//! | **Topic index** | `<output>/topic_index.db` | Centroid and count updated per route |
//! | **Topic document** | `<output>/topics/<slug>.md` | Append-only blocks, atomic replace |
//! | **Canonical entry** | `<output>/links/<YYYY>/<date>-<slug>-<hash>.md` | Written once |
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL, `synchronous=FULL`) for centroids; markdown files for notes
//! - **Embeddings**: any OpenAI-compatible `/embeddings` endpoint behind [`embedding::EmbeddingProvider`]
//! - **Routing**: cosine similarity plus a bounded lexical bonus from classifier hints
//! - **Concurrency**: embedding runs in parallel; decide-and-commit is serialised per index
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization, schema, and migrations
//! - [`embedding`] — Text-to-vector embedding seam and the HTTP provider
//! - [`topics`] — Topic types, similarity math, and the durable topic store
//! - [`notes`] — Topic document and canonical entry writers
//! - [`router`] — The routing engine tying the above together
//! - [`classification`] — Classifier output and its conversion to route requests

pub mod classification;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod notes;
pub mod router;
pub mod topics;

pub use error::{Error, Result};
pub use router::{RouteOutcome, RouteRequest, TopicRouter};
