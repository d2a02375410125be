pub mod embeddings;
pub mod pinecone;
pub mod retriever;
pub mod vector_store;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use self::retriever::Retriever;
use crate::error::Result;
use crate::llm::ChatModel;
use crate::models::Document;
use crate::prompt::{format_documents, ChatPromptTemplate};

/// Result of one pass through the chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutput {
    pub input: String,
    pub context: Vec<Document>,
    pub answer: String,
}

/// Retrieve, stuff the documents into the prompt, then generate.
#[derive(Clone)]
pub struct RagChain {
    retriever: Retriever,
    llm: Arc<dyn ChatModel>,
    prompt: ChatPromptTemplate,
}

impl RagChain {
    pub fn new(retriever: Retriever, llm: Arc<dyn ChatModel>, prompt: ChatPromptTemplate) -> Self {
        Self { retriever, llm, prompt }
    }

    pub async fn invoke(&self, input: &str) -> Result<ChainOutput> {
        let context = self.retriever.retrieve(input).await?;
        let stuffed = format_documents(&context);

        let vars = HashMap::from([("context", stuffed.as_str()), ("input", input)]);
        let messages = self.prompt.format_messages(&vars);
        let answer = self.llm.complete(&messages).await?;

        Ok(ChainOutput {
            input: input.to_string(),
            context,
            answer,
        })
    }
}
