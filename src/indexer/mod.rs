//! Loads local documents into the remote index the chat server reads from.

pub mod chunker;
pub mod extractor;
pub mod walker;

use std::path::Path;

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::models::Document;
use crate::rag::embeddings::Embedder;
use crate::rag::vector_store::VectorIndex;
use self::chunker::Splitter;
use self::extractor::extract_text;
use self::walker::SourceFormat;

pub const EMBED_BATCH_SIZE: usize = 32;

/// Stable per-file prefix so re-indexing a file overwrites its old chunks.
pub fn file_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

pub fn chunk_documents(path: &Path, text: &str, splitter: &Splitter) -> Vec<Document> {
    let path_id = file_id(path);
    let source = path.to_string_lossy();

    splitter
        .split(text)
        .into_iter()
        .map(|chunk| {
            Document::new(chunk.text)
                .with_id(format!("{}_{}", path_id, chunk.chunk_index))
                .with_metadata(serde_json::json!({
                    "source": source,
                    "chunk_index": chunk.chunk_index,
                }))
        })
        .collect()
}

/// Embeds and upserts `docs` in batches; returns the number written.
pub async fn store_documents(
    docs: Vec<Document>,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    batch_size: usize,
) -> Result<usize> {
    let mut written = 0;
    for batch in docs.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|d| d.page_content.clone()).collect();
        let vectors = embedder.embed_documents(texts).await?;
        if vectors.len() != batch.len() {
            anyhow::bail!(
                "embedding model returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            );
        }

        let items = batch.iter().cloned().zip(vectors).collect();
        written += index.upsert(items).await?;
    }
    Ok(written)
}

pub async fn index_file(
    path: &Path,
    format: SourceFormat,
    splitter: &Splitter,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
) -> Result<usize> {
    let text = extract_text(path, format)?;
    if text.trim().is_empty() {
        return Ok(0);
    }

    let docs = chunk_documents(path, &text, splitter);
    let count = docs.len();
    store_documents(docs, embedder, index, EMBED_BATCH_SIZE).await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    struct LenEmbedder;

    #[async_trait]
    impl Embedder for LenEmbedder {
        async fn embed_documents(&self, texts: Vec<String>) -> crate::error::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    #[derive(Default)]
    struct MemoryIndex {
        batches: Mutex<Vec<Vec<(Document, Vec<f32>)>>>,
    }

    #[async_trait]
    impl VectorIndex for MemoryIndex {
        async fn similarity_search(&self, _: Vec<f32>, _: u64) -> crate::error::Result<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn upsert(&self, items: Vec<(Document, Vec<f32>)>) -> crate::error::Result<usize> {
            let n = items.len();
            self.batches.lock().unwrap().push(items);
            Ok(n)
        }
    }

    #[test]
    fn test_file_id_is_stable_and_short() {
        let a = file_id(Path::new("data/Medical_book.pdf"));
        assert_eq!(a, file_id(Path::new("data/Medical_book.pdf")));
        assert_ne!(a, file_id(Path::new("data/other.pdf")));
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_chunk_documents_ids_and_metadata() {
        let splitter = Splitter::new(10, 0).unwrap();
        let docs = chunk_documents(Path::new("notes.txt"), "alpha beta gamma delta", &splitter);
        assert!(docs.len() > 1);

        let prefix = file_id(Path::new("notes.txt"));
        assert_eq!(docs[0].id.as_deref(), Some(format!("{}_0", prefix).as_str()));
        assert_eq!(docs[1].metadata["chunk_index"], 1);
        assert_eq!(docs[0].metadata["source"], "notes.txt");
    }

    #[tokio::test]
    async fn test_store_documents_batches() {
        let docs: Vec<Document> = (0..5).map(|i| Document::new(format!("doc {}", i))).collect();
        let index = MemoryIndex::default();

        let written = store_documents(docs, &LenEmbedder, &index, 2).await.unwrap();
        assert_eq!(written, 5);

        let batches = index.batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(batches[0][0].1, vec![5.0]);
    }

    #[tokio::test]
    async fn test_index_file_skips_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "  \n").unwrap();
        let index = MemoryIndex::default();

        let n = index_file(&path, SourceFormat::Text, &Splitter::new(100, 10).unwrap(), &LenEmbedder, &index)
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert!(index.batches.lock().unwrap().is_empty());
    }
}
