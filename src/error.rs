//! Error taxonomy for the retrieval and proxy paths.
//!
//! None of these are recovered internally. The HTTP layer maps each variant
//! to a status code and a machine-readable code (see [`RagError::code`]).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// No documents on disk and no persisted index to fall back on.
    #[error("corpus unavailable: {0}")]
    CorpusUnavailable(String),

    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("answer provider error: {0}")]
    AnswerProvider(String),

    /// Non-2xx, transport failure, or malformed JSON from the launch API.
    #[error("upstream launch data error: {0}")]
    UpstreamLaunchData(String),

    /// Vector dimensionality or model disagrees between index and embedder.
    #[error("configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    #[error("index persistence error: {0}")]
    Persistence(String),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),
}

impl RagError {
    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::CorpusUnavailable(_) => "corpus_unavailable",
            RagError::EmbeddingProvider(_) => "embedding_provider",
            RagError::AnswerProvider(_) => "answer_provider",
            RagError::UpstreamLaunchData(_) => "upstream_launch_data",
            RagError::ConfigurationMismatch(_) => "configuration_mismatch",
            RagError::Persistence(_) => "internal",
            RagError::InvalidQuestion(_) => "bad_request",
        }
    }

    /// True for errors caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RagError::InvalidQuestion(_))
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Persistence(err.to_string())
    }
}

pub type RagResult<T> = Result<T, RagError>;
