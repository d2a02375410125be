use std::collections::HashMap;
use std::fmt;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_INDEX_NAME: &str = "medical-chatbot";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_PINECONE_CONTROLLER: &str = "https://api.pinecone.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    Pinecone,
    Qdrant,
}

#[derive(Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_vector_store")]
    pub vector_store: VectorStoreKind,
    #[serde(default = "default_index_name")]
    pub index_name: String,

    pub pinecone_api_key: Option<String>,
    pub pinecone_index_host: Option<String>,
    #[serde(default = "default_pinecone_controller")]
    pub pinecone_controller_url: String,
    pub pinecone_namespace: Option<String>,

    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,

    pub groq_api_key: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,
    #[serde(default = "default_llm_max_retries")]
    pub llm_max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    #[serde(default = "default_retriever_k")]
    pub retriever_k: u64,

    pub embedding_model_dir: Option<String>,
    pub system_prompt: Option<String>,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_vector_store() -> VectorStoreKind {
    VectorStoreKind::Pinecone
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

fn default_pinecone_controller() -> String {
    DEFAULT_PINECONE_CONTROLLER.to_string()
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_llm_base_url() -> String {
    DEFAULT_LLM_BASE_URL.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_llm_temperature() -> f32 {
    0.7
}

fn default_llm_max_tokens() -> u32 {
    512
}

fn default_llm_max_retries() -> u32 {
    3
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_retriever_k() -> u64 {
    3
}

fn default_static_dir() -> String {
    "static".to_string()
}

impl Settings {
    /// Loads `.env`, the optional `config/default` and `config/local` files,
    /// then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_from(None)
    }

    /// Same as [`Settings::load`] but reads environment variables from `env`
    /// instead of the process environment when given.
    pub fn load_from(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default().try_parsing(true).source(env))
            .build()?
            .try_deserialize::<Settings>()?;

        Ok(settings.normalized())
    }

    // Blank values in .env files come through as empty strings.
    fn normalized(mut self) -> Self {
        for value in [
            &mut self.pinecone_api_key,
            &mut self.pinecone_index_host,
            &mut self.pinecone_namespace,
            &mut self.qdrant_api_key,
            &mut self.groq_api_key,
            &mut self.embedding_model_dir,
            &mut self.system_prompt,
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vector_store == VectorStoreKind::Pinecone && self.pinecone_api_key.is_none() {
            return Err(ConfigError::MissingCredential("PINECONE_API_KEY"));
        }
        if self.retriever_k == 0 {
            return Err(ConfigError::Invalid {
                key: "retriever_k",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.index_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "index_name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.groq_api_key.is_none() {
            tracing::warn!("GROQ_API_KEY is not set; LLM requests will be sent without credentials");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("vector_store", &self.vector_store)
            .field("index_name", &self.index_name)
            .field("pinecone_api_key", &redact(&self.pinecone_api_key))
            .field("pinecone_index_host", &self.pinecone_index_host)
            .field("pinecone_controller_url", &self.pinecone_controller_url)
            .field("pinecone_namespace", &self.pinecone_namespace)
            .field("qdrant_url", &self.qdrant_url)
            .field("qdrant_api_key", &redact(&self.qdrant_api_key))
            .field("groq_api_key", &redact(&self.groq_api_key))
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_temperature", &self.llm_temperature)
            .field("llm_max_tokens", &self.llm_max_tokens)
            .field("llm_max_retries", &self.llm_max_retries)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("retriever_k", &self.retriever_k)
            .field("embedding_model_dir", &self.embedding_model_dir)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}
