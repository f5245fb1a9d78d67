//! Core data types flowing through indexing and retrieval.

use serde::{Deserialize, Serialize};

/// A text file from the corpus directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Hex SHA-256 of `source_path`.
    pub id: String,
    pub text: String,
    /// Path relative to the corpus root, `/`-separated.
    pub source_path: String,
}

/// A chunk of a document's text; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<document_id>:<index>`.
    pub id: String,
    pub text: String,
    /// Hex SHA-256 of `text`; compared on load to spot a changed corpus.
    pub hash: String,
}

/// A retrieved chunk with its cosine similarity to the question.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub text: String,
    pub source_path: String,
    pub score: f32,
}

/// The outcome of one retrieval-augmented query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub answer_text: String,
    /// Ordered by descending score.
    pub supporting_chunks: Vec<ScoredChunk>,
}

/// The three fields the service exposes from the latest-launch record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSummary {
    pub name: String,
    pub date_utc: String,
    /// `null` upstream for launches that have not flown yet.
    pub success: Option<bool>,
}
