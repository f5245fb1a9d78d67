//! Retrieval-augmented query engine.
//!
//! Owns the two providers and the single index for the process. The index is
//! built (or loaded) by the first caller of [`RagEngine::index`]; concurrent
//! first callers wait on the same build. A failed build leaves the cell empty
//! so the next query tries again.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RagResult};
use crate::index::{build_or_load, VectorIndex};
use crate::llm::AnswerProvider;
use crate::models::QueryResult;
use crate::prompt::{build_prompt, source_preview};

pub struct RagEngine {
    config: Arc<Config>,
    embedder: Arc<dyn EmbeddingProvider>,
    answerer: Arc<dyn AnswerProvider>,
    index: OnceCell<Arc<VectorIndex>>,
}

impl RagEngine {
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<dyn EmbeddingProvider>,
        answerer: Arc<dyn AnswerProvider>,
    ) -> Self {
        Self {
            config,
            embedder,
            answerer,
            index: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The process-wide index, building or loading it on first use.
    pub async fn index(&self) -> RagResult<Arc<VectorIndex>> {
        let index = self
            .index
            .get_or_try_init(|| async {
                info!("initializing index");
                build_or_load(&self.config, self.embedder.as_ref())
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(index))
    }

    pub fn is_index_ready(&self) -> bool {
        self.index.initialized()
    }

    /// Answer `question` from the top-k retrieved chunks.
    pub async fn answer(&self, question: &str) -> RagResult<QueryResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidQuestion(
                "question must not be empty".to_string(),
            ));
        }

        let index = self.index().await?;
        let query_vec = self.embedder.embed(question).await?;
        let mut hits = index.search(&query_vec, self.config.retrieval.top_k)?;
        debug!(
            hits = hits.len(),
            best = hits.first().map(|h| h.score).unwrap_or(0.0),
            "retrieved chunks"
        );

        let prompt = build_prompt(question, &hits, self.answerer.context_window());
        if prompt.used_chunks < hits.len() {
            debug!(
                retrieved = hits.len(),
                used = prompt.used_chunks,
                "context window cut retrieved chunks"
            );
            hits.truncate(prompt.used_chunks);
        }

        let answer_text = self.answerer.complete(&prompt.text).await?;
        if answer_text.trim().is_empty() {
            return Err(RagError::AnswerProvider(format!(
                "model '{}' returned an empty completion",
                self.answerer.model_name()
            )));
        }

        Ok(QueryResult {
            answer_text,
            supporting_chunks: hits,
        })
    }

    /// Preview strings for the chunks behind an answer, in score order.
    pub fn source_previews(&self, result: &QueryResult) -> Vec<String> {
        result
            .supporting_chunks
            .iter()
            .map(|c| source_preview(&c.text, self.config.retrieval.preview_chars))
            .collect()
    }
}
