use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{
    EmbeddingModel, InitOptions, InitOptionsUserDefined, TextEmbedding, TokenizerFiles,
    UserDefinedEmbeddingModel,
};

use crate::error::{RagError, Result};

/// all-MiniLM-L6-v2 output size.
pub const DEFAULT_DIMENSION: usize = 384;

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("model returned no embedding".to_string()))
    }

    fn dimension(&self) -> usize;
}

/// Local ONNX sentence-transformer via fastembed.
pub struct FastEmbedder {
    model: Arc<TextEmbedding>,
    dimension: usize,
}

impl FastEmbedder {
    /// Downloads (or reuses the cached) pretrained all-MiniLM-L6-v2 model.
    pub fn pretrained() -> Result<Self> {
        tracing::info!("Loading pretrained embedding model all-MiniLM-L6-v2...");

        let options = InitOptions {
            model_name: EmbeddingModel::AllMiniLML6V2,
            show_download_progress: true,
            ..Default::default()
        };
        let model = TextEmbedding::try_new(options)
            .map_err(|e| RagError::Embedding(format!("failed to initialize embedding model: {}", e)))?;

        tracing::info!("Embedding model initialized successfully");
        Ok(Self {
            model: Arc::new(model),
            dimension: DEFAULT_DIMENSION,
        })
    }

    /// Loads a sentence-transformer exported to ONNX from `model_dir`.
    pub fn from_dir(model_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing embedding model from {}", model_dir.display());

        if !model_dir.exists() {
            return Err(RagError::Embedding(format!(
                "model directory not found: {}",
                model_dir.display()
            )));
        }

        let read = |name: &str| {
            std::fs::read(model_dir.join(name))
                .map_err(|e| RagError::Embedding(format!("failed to read {}: {}", name, e)))
        };

        let user_model = UserDefinedEmbeddingModel {
            onnx_file: read("model.onnx")?,
            tokenizer_files: TokenizerFiles {
                tokenizer_file: read("tokenizer.json")?,
                config_file: read("config.json")?,
                special_tokens_map_file: read("special_tokens_map.json")?,
                tokenizer_config_file: read("tokenizer_config.json")?,
            },
        };

        let model = TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
            .map_err(|e| RagError::Embedding(format!("failed to initialize embedding model: {}", e)))?;

        let dimension = model
            .embed(vec!["dimension check"], None)
            .map_err(|e| RagError::Embedding(e.to_string()))?
            .first()
            .map(Vec::len)
            .unwrap_or(DEFAULT_DIMENSION);

        tracing::info!("Embedding model initialized successfully ({} dimensions)", dimension);
        Ok(Self {
            model: Arc::new(model),
            dimension,
        })
    }

    pub fn load(model_dir: Option<&str>) -> Result<Self> {
        match model_dir {
            Some(dir) => Self::from_dir(Path::new(dir)),
            None => Self::pretrained(),
        }
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Inference is CPU-bound; keep it off the async workers.
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| RagError::Embedding(format!("embedding task failed: {}", e)))?
            .map_err(|e| RagError::Embedding(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
