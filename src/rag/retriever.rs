use std::sync::Arc;

use super::embeddings::Embedder;
use super::vector_store::VectorIndex;
use crate::error::Result;
use crate::models::Document;

/// Similarity search with a fixed result count.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    k: u64,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, k: u64) -> Self {
        Self { embedder, index, k }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let query_embedding = self.embedder.embed_query(query).await?;
        let mut docs = self.index.similarity_search(query_embedding, self.k).await?;
        docs.truncate(self.k as usize);
        tracing::debug!("Retrieved {} documents", docs.len());
        Ok(docs)
    }
}
