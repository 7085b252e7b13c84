//! The knowledge retriever — grounded Q&A over two tagged corpus partitions.
//!
//! `ask` embeds the question, ranks the partition's chunks by cosine
//! similarity, and folds the best passages into a single synthesis prompt.
//! The retriever is an opaque oracle: it guarantees grounding in the indexed
//! passages, not factual correctness.

use crate::store::{chunk_document, Chunk, VectorStore};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use taskhelm_core::error::RetrievalError;
use taskhelm_core::message::Message;
use taskhelm_core::provider::{EmbeddingRequest, Provider, ProviderRequest};
use tracing::{debug, info};
use uuid::Uuid;

/// Which corpus partition to answer from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    /// General documentation Q&A
    Documentation,
    /// Process how-to guidance consulted before planning
    Cookbook,
}

impl Topic {
    pub fn tag(&self) -> &'static str {
        match self {
            Topic::Documentation => "documentation",
            Topic::Cookbook => "cookbook",
        }
    }
}

/// Retrieval over a file-backed vector index.
pub struct KnowledgeRetriever {
    provider: Arc<dyn Provider>,
    store: VectorStore,
    chat_model: String,
    embedding_model: String,
    top_k: usize,
    ready: AtomicBool,
}

impl KnowledgeRetriever {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: VectorStore,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            provider,
            store,
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            top_k,
            ready: AtomicBool::new(false),
        }
    }

    /// Ingest the two source documents into their partitions.
    ///
    /// Must complete before any `ask` call. Idempotent: an existing
    /// partition is left alone unless `reimport` is set or the index
    /// directory is empty/missing.
    pub async fn ingest(
        &self,
        docs_file: &Path,
        cookbook_file: &Path,
        reimport: bool,
    ) -> Result<(), RetrievalError> {
        let force = reimport || self.store.is_empty();
        self.ingest_partition(Topic::Documentation, docs_file, force)
            .await?;
        self.ingest_partition(Topic::Cookbook, cookbook_file, force)
            .await?;
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn ingest_partition(
        &self,
        topic: Topic,
        source: &Path,
        force: bool,
    ) -> Result<(), RetrievalError> {
        let tag = topic.tag();
        if !force && self.store.partition_exists(tag) {
            debug!(tag, "Partition already indexed, skipping import");
            return Ok(());
        }

        let text = std::fs::read_to_string(source).map_err(|e| {
            RetrievalError::IngestionFailed(format!("read {}: {e}", source.display()))
        })?;
        let passages = chunk_document(&text);
        if passages.is_empty() {
            return Err(RetrievalError::IngestionFailed(format!(
                "{} contains no text",
                source.display()
            )));
        }

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: passages.clone(),
            })
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != passages.len() {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                passages.len(),
                response.embeddings.len()
            )));
        }

        let chunks: Vec<Chunk> = passages
            .into_iter()
            .zip(response.embeddings)
            .map(|(text, embedding)| Chunk {
                id: Uuid::new_v4().to_string(),
                text,
                tag: tag.to_string(),
                embedding,
            })
            .collect();

        self.store.write_partition(tag, &chunks)?;
        info!(tag, count = chunks.len(), "Ingested corpus partition");
        Ok(())
    }

    /// Answer a free-text question from the given partition.
    ///
    /// Backend failures propagate unchanged — no retry.
    pub async fn ask(&self, question: &str, topic: Topic) -> Result<String, RetrievalError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(RetrievalError::Uninitialized);
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "question must be non-empty".into(),
            ));
        }

        let embedded = self
            .provider
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: vec![question.to_string()],
            })
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        let query = embedded
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::EmbeddingFailed("empty embedding response".into()))?;

        let passages = self.store.rank(topic.tag(), &query, self.top_k)?;
        debug!(topic = topic.tag(), count = passages.len(), "Retrieved passages");

        let mut context = String::new();
        for (i, chunk) in passages.iter().enumerate() {
            context.push_str(&format!("[{}] {}\n\n", i + 1, chunk.text));
        }

        let system = "You answer questions using only the provided passages. \
                      If the passages do not cover the question, say so briefly.";
        let prompt = format!("Passages:\n{context}Question: {question}");

        let response = self
            .provider
            .complete(ProviderRequest::new(
                self.chat_model.clone(),
                vec![Message::system(system), Message::user(prompt)],
            ))
            .await
            .map_err(|e| RetrievalError::SynthesisFailed(e.to_string()))?;

        Ok(response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use taskhelm_core::error::ProviderError;
    use taskhelm_core::provider::{EmbeddingResponse, ProviderResponse};

    /// Embeds every text as a fixed vector and answers with a canned string.
    struct StubProvider {
        embed_calls: AtomicUsize,
        complete_calls: AtomicUsize,
    }

    impl StubProvider {
        fn new() -> Self {
            Self {
                embed_calls: AtomicUsize::new(0),
                complete_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.complete_calls.fetch_add(1, Ordering::SeqCst);
            // Echo the first passage marker so tests can see grounding happened
            let grounded = request.messages.iter().any(|m| m.content.contains("[1]"));
            Ok(ProviderResponse {
                message: Message::assistant(if grounded {
                    "grounded answer"
                } else {
                    "ungrounded answer"
                }),
                model: "stub-model".into(),
            })
        }

        async fn embed(
            &self,
            request: EmbeddingRequest,
        ) -> Result<EmbeddingResponse, ProviderError> {
            self.embed_calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingResponse {
                embeddings: request.inputs.iter().map(|_| vec![1.0, 0.0]).collect(),
                model: "stub-embed".into(),
            })
        }
    }

    fn write_corpus(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        let docs = dir.join("documentation.txt");
        let cookbook = dir.join("cookbook.txt");
        std::fs::write(
            &docs,
            "Retrieval-augmented generation grounds answers in indexed passages of text.",
        )
        .unwrap();
        std::fs::write(
            &cookbook,
            "To organize a conference, first fix the date, then invite participants by email.",
        )
        .unwrap();
        (docs, cookbook)
    }

    fn retriever(provider: Arc<StubProvider>, dir: &Path) -> KnowledgeRetriever {
        KnowledgeRetriever::new(
            provider,
            VectorStore::new(dir.join("index")),
            "stub-model",
            "stub-embed",
            3,
        )
    }

    #[tokio::test]
    async fn ask_before_ingest_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let r = retriever(Arc::new(StubProvider::new()), tmp.path());
        let err = r.ask("anything", Topic::Documentation).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Uninitialized));
    }

    #[tokio::test]
    async fn ingest_then_ask_synthesizes_grounded_answer() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(StubProvider::new());
        let r = retriever(provider.clone(), tmp.path());
        let (docs, cookbook) = write_corpus(tmp.path());

        r.ingest(&docs, &cookbook, false).await.unwrap();
        let answer = r.ask("how to organize?", Topic::Cookbook).await.unwrap();
        assert_eq!(answer, "grounded answer");
        assert_eq!(provider.complete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reingest_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(StubProvider::new());
        let r = retriever(provider.clone(), tmp.path());
        let (docs, cookbook) = write_corpus(tmp.path());

        r.ingest(&docs, &cookbook, false).await.unwrap();
        let first_round = provider.embed_calls.load(Ordering::SeqCst);
        assert_eq!(first_round, 2); // one embed batch per partition

        // Second ingest without reimport: partitions exist, no new embeds
        r.ingest(&docs, &cookbook, false).await.unwrap();
        assert_eq!(provider.embed_calls.load(Ordering::SeqCst), first_round);

        // Forced reimport embeds again
        r.ingest(&docs, &cookbook, true).await.unwrap();
        assert_eq!(provider.embed_calls.load(Ordering::SeqCst), first_round + 2);
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(StubProvider::new());
        let r = retriever(provider, tmp.path());
        let (docs, cookbook) = write_corpus(tmp.path());
        r.ingest(&docs, &cookbook, false).await.unwrap();

        assert!(r.ask("   ", Topic::Documentation).await.is_err());
    }

    #[tokio::test]
    async fn missing_source_file_fails_ingestion() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = Arc::new(StubProvider::new());
        let r = retriever(provider, tmp.path());
        let err = r
            .ingest(
                &tmp.path().join("missing.txt"),
                &tmp.path().join("also-missing.txt"),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::IngestionFailed(_)));
    }
}
