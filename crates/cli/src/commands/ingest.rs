//! `taskhelm ingest` — force re-ingestion of the knowledge corpus.

use std::sync::Arc;
use taskhelm_config::AppConfig;
use taskhelm_core::provider::Provider;
use taskhelm_retrieval::{KnowledgeRetriever, VectorStore};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() {
        return Err("No API key configured; embeddings need TASKHELM_API_KEY.".into());
    }

    let provider: Arc<dyn Provider> = Arc::new(taskhelm_providers::OpenAiCompatProvider::new(
        "openai",
        &config.provider.base_url,
        config.provider.api_key.clone().unwrap_or_default(),
    )?);

    let retriever = KnowledgeRetriever::new(
        provider,
        VectorStore::new(&config.retrieval.index_dir),
        &config.provider.chat_model,
        &config.provider.embedding_model,
        config.retrieval.top_k,
    );
    retriever
        .ingest(&config.retrieval.docs_file, &config.retrieval.cookbook_file, true)
        .await?;

    println!("Corpus ingested into {}.", config.retrieval.index_dir.display());
    Ok(())
}
