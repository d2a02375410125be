#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use medical_chatbot::error::{RagError, Result};
use medical_chatbot::llm::ChatModel;
use medical_chatbot::models::{Document, Message};
use medical_chatbot::prompt::ChatPromptTemplate;
use medical_chatbot::rag::embeddings::Embedder;
use medical_chatbot::rag::retriever::Retriever;
use medical_chatbot::rag::vector_store::VectorIndex;
use medical_chatbot::rag::RagChain;

pub struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.5; 4]).collect())
    }

    fn dimension(&self) -> usize {
        4
    }
}

/// Returns its stored documents in order, recording each requested `k`.
#[derive(Default)]
pub struct StaticIndex {
    pub docs: Vec<Document>,
    pub requested_k: Mutex<Vec<u64>>,
    pub fail: bool,
}

impl StaticIndex {
    pub fn with_docs(texts: &[&str]) -> Self {
        Self {
            docs: texts.iter().map(|t| Document::new(*t)).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl VectorIndex for StaticIndex {
    async fn similarity_search(&self, _vector: Vec<f32>, k: u64) -> Result<Vec<Document>> {
        self.requested_k.lock().unwrap().push(k);
        if self.fail {
            return Err(RagError::VectorStore("index unavailable".to_string()));
        }
        Ok(self.docs.iter().take(k as usize).cloned().collect())
    }

    async fn upsert(&self, items: Vec<(Document, Vec<f32>)>) -> Result<usize> {
        Ok(items.len())
    }
}

/// Answers with a canned reply and keeps the prompts it was sent.
pub struct EchoLlm {
    pub reply: String,
    pub prompts: Mutex<Vec<Vec<Message>>>,
    pub fail: bool,
}

impl EchoLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }
}

#[async_trait]
impl ChatModel for EchoLlm {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        if self.fail {
            return Err(RagError::Llm("429 Too Many Requests".to_string()));
        }
        Ok(self.reply.clone())
    }
}

pub fn chain(index: Arc<StaticIndex>, llm: Arc<EchoLlm>, k: u64) -> RagChain {
    let retriever = Retriever::new(Arc::new(FixedEmbedder), index, k);
    RagChain::new(retriever, llm, ChatPromptTemplate::question_answering(None))
}
