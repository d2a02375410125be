use std::sync::Arc;

use crate::config::{Settings, VectorStoreKind};
use crate::error::{ConfigError, Result};
use crate::llm::ChatClient;
use crate::prompt::ChatPromptTemplate;
use crate::rag::embeddings::{Embedder, FastEmbedder};
use crate::rag::pinecone::PineconeIndex;
use crate::rag::retriever::Retriever;
use crate::rag::vector_store::{QdrantIndex, VectorIndex};
use crate::rag::RagChain;

/// Binds to the configured pre-existing index.
pub async fn connect_index(settings: &Settings, dimension: usize) -> Result<Arc<dyn VectorIndex>> {
    match settings.vector_store {
        VectorStoreKind::Pinecone => {
            let api_key = settings
                .pinecone_api_key
                .as_deref()
                .ok_or(ConfigError::MissingCredential("PINECONE_API_KEY"))?;

            let index = match settings.pinecone_index_host.as_deref() {
                Some(host) => {
                    tracing::info!("Using Pinecone index host {}", host);
                    PineconeIndex::with_host(api_key, host, settings.pinecone_namespace.clone())
                }
                None => {
                    PineconeIndex::connect(
                        &settings.pinecone_controller_url,
                        api_key,
                        &settings.index_name,
                        settings.pinecone_namespace.clone(),
                        dimension,
                    )
                    .await?
                }
            };
            Ok(Arc::new(index))
        }
        VectorStoreKind::Qdrant => {
            let index = QdrantIndex::connect(
                &settings.qdrant_url,
                settings.qdrant_api_key.clone(),
                &settings.index_name,
            )
            .await?;
            Ok(Arc::new(index))
        }
    }
}

pub fn load_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(FastEmbedder::load(settings.embedding_model_dir.as_deref())?))
}

/// Validates settings, then builds the three external clients and wires them
/// into a chain. Fails before touching the network when a credential is missing.
pub async fn build_chain(settings: &Settings) -> Result<RagChain> {
    settings.validate()?;
    tracing::info!("API keys loaded successfully");

    let embedder = load_embedder(settings)?;
    let index = connect_index(settings, embedder.dimension()).await?;
    let retriever = Retriever::new(embedder, index, settings.retriever_k);

    tracing::info!(
        "Using LLM {} at {} (temperature {}, max_tokens {})",
        settings.llm_model,
        settings.llm_base_url,
        settings.llm_temperature,
        settings.llm_max_tokens
    );
    let llm = Arc::new(ChatClient::from_settings(settings)?);
    let prompt = ChatPromptTemplate::question_answering(settings.system_prompt.as_deref());

    Ok(RagChain::new(retriever, llm, prompt))
}
