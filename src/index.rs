//! In-memory vector index with optional on-disk persistence.
//!
//! A [`VectorIndex`] holds every chunk of the corpus alongside its embedding
//! and answers top-k cosine similarity queries by brute force. The corpus is
//! small (a directory of launch notes), so no approximate structure is needed.
//!
//! Persisted layout: a single `index.json` inside the persist directory,
//! written to `index.json.tmp` and renamed into place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::chunk::chunk_document;
use crate::config::Config;
use crate::connector_fs::scan_corpus;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{RagError, RagResult};
use crate::models::{Chunk, Document, ScoredChunk};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub model: String,
    pub dims: usize,
    pub built_at: DateTime<Utc>,
    pub document_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub source_path: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    pub manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Chunk and embed `documents`, batching calls to the provider.
    ///
    /// Fails with `ConfigurationMismatch` if any returned vector's length
    /// differs from `embedder.dims()`. The index is returned only once every
    /// chunk has been embedded.
    pub async fn build(
        documents: &[Document],
        embedder: &dyn EmbeddingProvider,
        max_tokens: usize,
        batch_size: usize,
    ) -> RagResult<Self> {
        let dims = embedder.dims();
        let mut pending: Vec<(Chunk, String)> = Vec::new();
        for doc in documents {
            for chunk in chunk_document(doc, max_tokens) {
                pending.push((chunk, doc.source_path.clone()));
            }
        }

        let mut entries = Vec::with_capacity(pending.len());
        for batch in pending.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|(c, _)| c.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::EmbeddingProvider(format!(
                    "expected {} embeddings, provider returned {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            for ((chunk, source_path), vector) in batch.iter().zip(vectors) {
                check_dims(dims, vector.len(), &chunk.id)?;
                entries.push(IndexEntry {
                    chunk: chunk.clone(),
                    source_path: source_path.clone(),
                    vector,
                });
            }
        }

        let manifest = IndexManifest {
            model: embedder.model_name().to_string(),
            dims,
            built_at: Utc::now(),
            document_count: documents.len(),
            chunk_count: entries.len(),
        };
        info!(
            documents = manifest.document_count,
            chunks = manifest.chunk_count,
            model = %manifest.model,
            "index built"
        );

        Ok(Self { manifest, entries })
    }

    /// A zero-document index for an explicitly empty corpus.
    pub fn empty(embedder: &dyn EmbeddingProvider) -> Self {
        Self {
            manifest: IndexManifest {
                model: embedder.model_name().to_string(),
                dims: embedder.dims(),
                built_at: Utc::now(),
                document_count: 0,
                chunk_count: 0,
            },
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-`k` chunks by cosine similarity, best first; ties broken by chunk id.
    pub fn search(&self, query: &[f32], k: usize) -> RagResult<Vec<ScoredChunk>> {
        check_dims(self.manifest.dims, query.len(), "query")?;

        // NaN from a bad vector ranks below every real score.
        let mut scored: Vec<(&IndexEntry, f32)> = self
            .entries
            .iter()
            .map(|e| {
                let score = cosine_similarity(query, &e.vector);
                (e, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        scored.sort_by(|(a, sa), (b, sb)| {
            sb.total_cmp(sa).then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(e, score)| ScoredChunk {
                chunk_id: e.chunk.id.clone(),
                text: e.chunk.text.clone(),
                source_path: e.source_path.clone(),
                score,
            })
            .collect())
    }

    pub fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    pub fn exists(dir: &Path) -> bool {
        Self::index_path(dir).is_file()
    }

    pub fn save(&self, dir: &Path) -> RagResult<()> {
        std::fs::create_dir_all(dir)?;
        let final_path = Self::index_path(dir);
        let tmp_path = dir.join(format!("{}.tmp", INDEX_FILE));
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &final_path)?;
        info!(path = %final_path.display(), chunks = self.len(), "index saved");
        Ok(())
    }

    /// Load a saved index and verify it was built with the active embedder.
    pub fn load(dir: &Path, embedder: &dyn EmbeddingProvider) -> RagResult<Self> {
        let path = Self::index_path(dir);
        let bytes = std::fs::read(&path)?;
        let index: VectorIndex = serde_json::from_slice(&bytes)?;

        if index.manifest.model != embedder.model_name() {
            return Err(RagError::ConfigurationMismatch(format!(
                "persisted index was built with model '{}' but the embedder is '{}'",
                index.manifest.model,
                embedder.model_name()
            )));
        }
        check_dims(embedder.dims(), index.manifest.dims, "persisted index")?;
        for entry in &index.entries {
            check_dims(index.manifest.dims, entry.vector.len(), &entry.chunk.id)?;
        }

        info!(path = %path.display(), chunks = index.len(), "index loaded");
        Ok(index)
    }

    /// Whether chunking `documents` now would give different chunk ids or
    /// contents than the ones this index was built from.
    pub fn is_stale(&self, documents: &[Document], max_tokens: usize) -> bool {
        let mut current: Vec<(String, String)> = documents
            .iter()
            .flat_map(|doc| chunk_document(doc, max_tokens))
            .map(|chunk| (chunk.id, chunk.hash))
            .collect();
        let mut stored: Vec<(String, String)> = self
            .entries
            .iter()
            .map(|e| (e.chunk.id.clone(), e.chunk.hash.clone()))
            .collect();
        current.sort();
        stored.sort();
        current != stored
    }
}

fn check_dims(expected: usize, actual: usize, what: &str) -> RagResult<()> {
    if expected != actual {
        return Err(RagError::ConfigurationMismatch(format!(
            "{} has dimension {} but the index expects {}",
            what, actual, expected
        )));
    }
    Ok(())
}

/// Load the persisted index if there is one, otherwise scan, embed and
/// (when a persist dir is configured) save.
pub async fn build_or_load(config: &Config, embedder: &dyn EmbeddingProvider) -> RagResult<VectorIndex> {
    if let Some(dir) = &config.index.persist_dir {
        if VectorIndex::exists(dir) {
            let index = VectorIndex::load(dir, embedder)?;
            if let Ok(documents) = scan_corpus(&config.corpus) {
                if index.is_stale(&documents, config.chunking.max_tokens) {
                    warn!(
                        path = %dir.display(),
                        "corpus changed since the index was built; run `spacex-rag index build` to refresh"
                    );
                }
            }
            return Ok(index);
        }
    }
    rebuild(config, embedder).await
}

/// Build from the corpus unconditionally, overwriting any persisted index.
pub async fn rebuild(config: &Config, embedder: &dyn EmbeddingProvider) -> RagResult<VectorIndex> {
    let documents = match scan_corpus(&config.corpus) {
        Ok(docs) => docs,
        Err(RagError::CorpusUnavailable(_)) if config.corpus.allow_empty => Vec::new(),
        Err(e) => return Err(e),
    };

    let index = if documents.is_empty() {
        if !config.corpus.allow_empty {
            return Err(RagError::CorpusUnavailable(format!(
                "no documents found under {} and no persisted index",
                config.corpus.root.display()
            )));
        }
        info!(root = %config.corpus.root.display(), "corpus empty, using zero-document index");
        VectorIndex::empty(embedder)
    } else {
        VectorIndex::build(
            &documents,
            embedder,
            config.chunking.max_tokens,
            config.embedding.batch_size,
        )
        .await?
    };

    if let Some(dir) = &config.index.persist_dir {
        index.save(dir)?;
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use tempfile::TempDir;

    /// Vectors from letter counts of a few keywords; deterministic and cheap.
    struct KeywordEmbedder {
        model: &'static str,
        dims: usize,
        calls: AtomicUsize,
    }

    impl KeywordEmbedder {
        fn new(dims: usize) -> Self {
            Self::named("keyword-test", dims)
        }

        fn named(model: &'static str, dims: usize) -> Self {
            Self {
                model,
                dims,
                calls: AtomicUsize::new(0),
            }
        }
    }

    const KEYWORDS: [&str; 4] = ["boostback", "raptor", "catch", "orbit"];

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            self.model
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    let mut v: Vec<f32> = KEYWORDS
                        .iter()
                        .map(|k| lower.matches(k).count() as f32)
                        .collect();
                    v.push(0.01);
                    v.resize(self.dims, 0.0);
                    v
                })
                .collect())
        }
    }

    fn docs() -> Vec<Document> {
        vec![
            Document {
                id: "a".into(),
                text: "IFT-5 boostback burn anomaly.".into(),
                source_path: "ift5.txt".into(),
            },
            Document {
                id: "b".into(),
                text: "Raptor engine test.".into(),
                source_path: "raptor.txt".into(),
            },
            Document {
                id: "c".into(),
                text: "Chopsticks catch the booster.".into(),
                source_path: "catch.txt".into(),
            },
        ]
    }

    #[tokio::test]
    async fn test_search_ranks_matching_chunk_first() {
        let embedder = KeywordEmbedder::new(5);
        let index = VectorIndex::build(&docs(), &embedder, 256, 64).await.unwrap();
        assert_eq!(index.len(), 3);

        let q = embedder.embed("boostback?").await.unwrap();
        let hits = index.search(&q, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source_path, "ift5.txt");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_build_batches_requests() {
        let embedder = KeywordEmbedder::new(5);
        VectorIndex::build(&docs(), &embedder, 256, 2).await.unwrap();
        assert_eq!(embedder.calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_build_rejects_wrong_dims() {
        struct Liar;
        #[async_trait]
        impl EmbeddingProvider for Liar {
            fn model_name(&self) -> &str {
                "liar"
            }
            fn dims(&self) -> usize {
                8
            }
            async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0; 4]).collect())
            }
        }
        let err = VectorIndex::build(&docs(), &Liar, 256, 64).await.unwrap_err();
        assert!(matches!(err, RagError::ConfigurationMismatch(_)));
    }

    #[tokio::test]
    async fn test_search_rejects_wrong_query_dims() {
        let embedder = KeywordEmbedder::new(5);
        let index = VectorIndex::build(&docs(), &embedder, 256, 64).await.unwrap();
        let err = index.search(&[1.0, 0.0], 2).unwrap_err();
        assert!(matches!(err, RagError::ConfigurationMismatch(_)));
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let embedder = KeywordEmbedder::new(5);
        let index = VectorIndex::build(&docs(), &embedder, 256, 64).await.unwrap();
        index.save(tmp.path()).unwrap();
        assert!(VectorIndex::exists(tmp.path()));
        assert!(!tmp.path().join("index.json.tmp").exists());

        let loaded = VectorIndex::load(tmp.path(), &embedder).unwrap();
        assert_eq!(loaded, index);
    }

    #[tokio::test]
    async fn test_load_rejects_other_dims() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::build(&docs(), &KeywordEmbedder::new(5), 256, 64)
            .await
            .unwrap();
        index.save(tmp.path()).unwrap();

        let err = VectorIndex::load(tmp.path(), &KeywordEmbedder::new(7)).unwrap_err();
        assert!(matches!(err, RagError::ConfigurationMismatch(_)));
    }

    #[tokio::test]
    async fn test_load_rejects_other_model() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::build(&docs(), &KeywordEmbedder::named("nomic-embed-text", 5), 256, 64)
            .await
            .unwrap();
        index.save(tmp.path()).unwrap();

        let err = VectorIndex::load(tmp.path(), &KeywordEmbedder::named("all-minilm", 5)).unwrap_err();
        assert!(matches!(err, RagError::ConfigurationMismatch(_)));
        assert!(err.to_string().contains("nomic-embed-text"));
    }

    #[tokio::test]
    async fn test_search_ranks_nan_scores_last() {
        let embedder = KeywordEmbedder::new(5);
        let mut index = VectorIndex::build(&docs(), &embedder, 256, 64).await.unwrap();
        index.entries[0].vector[0] = f32::NAN;

        let q = embedder.embed("boostback raptor catch").await.unwrap();
        let first = index.search(&q, 3).unwrap();
        index.entries.reverse();
        let second = index.search(&q, 3).unwrap();

        let ids = |hits: &[ScoredChunk]| hits.iter().map(|h| h.chunk_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first[..]), ids(&second[..]));
        assert_eq!(first[2].source_path, "ift5.txt");
        assert_eq!(first[2].score, f32::NEG_INFINITY);
    }

    #[tokio::test]
    async fn test_stale_when_corpus_text_changes() {
        let embedder = KeywordEmbedder::new(5);
        let mut documents = docs();
        let index = VectorIndex::build(&documents, &embedder, 256, 64).await.unwrap();
        assert!(!index.is_stale(&documents, 256));

        documents[1].text = "Raptor 3 engine test.".into();
        assert!(index.is_stale(&documents, 256));

        assert!(index.is_stale(&docs()[..2], 256));
    }

    #[tokio::test]
    async fn test_empty_index_search_returns_nothing() {
        let embedder = KeywordEmbedder::new(5);
        let index = VectorIndex::empty(&embedder);
        assert!(index.is_empty());
        let q = embedder.embed("anything").await.unwrap();
        assert!(index.search(&q, 2).unwrap().is_empty());
    }
}
