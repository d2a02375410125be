use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::Settings;
use crate::error::{RagError, Result};
use crate::models::{ChatRequest, ChatResponse, Message};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (Groq by default).
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    backoff: Duration,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 512,
            max_retries: 3,
            backoff: INITIAL_BACKOFF,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.llm_timeout_secs))
            .build()?;

        Ok(Self::new(
            settings.llm_base_url.clone(),
            settings.groq_api_key.clone(),
            settings.llm_model.clone(),
        )
        .with_client(client)
        .with_temperature(settings.llm_temperature)
        .with_max_tokens(settings.llm_max_tokens)
        .with_max_retries(settings.llm_max_retries))
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut attempt = 0;

        loop {
            match self.send_once(&url, request).await {
                Ok(response) => return Ok(response),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retryable(e)) if attempt >= self.max_retries => return Err(e),
                Err(Attempt::Retryable(e)) => {
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        "LLM request failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_once(&self, url: &str, request: &ChatRequest) -> Result<ChatResponse, Attempt> {
        let mut req = self.client.post(url).json(request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = match req.send().await {
            Ok(r) => r,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Err(Attempt::Retryable(RagError::Http(e)))
            }
            Err(e) => return Err(Attempt::Fatal(RagError::Http(e))),
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let err = RagError::Llm(format!("{} - {}", status, error_text));
            return if is_retryable(status) {
                Err(Attempt::Retryable(err))
            } else {
                Err(Attempt::Fatal(err))
            };
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| Attempt::Fatal(RagError::Llm(format!("malformed response: {}", e))))
    }
}

enum Attempt {
    Retryable(RagError),
    Fatal(RagError),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            stream: None,
        };

        let response = self.chat_completion(&request).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                "LLM usage: prompt={} completion={} total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RagError::Llm("response contained no choices".to_string()))
    }
}
