//! Answer providers: the language model that writes the final answer.
//!
//! - **[`OpenAiChat`]**: non-streaming `POST {url}/chat/completions` on any
//!   OpenAI-compatible API (api.openai.com, api.x.ai).
//! - **[`OllamaChat`]**: non-streaming `POST {url}/api/chat` on a local Ollama.
//!
//! Both share the retry policy in [`crate::retry`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{LlmConfig, LlmKind};
use crate::error::{RagError, RagResult};
use crate::retry::send_with_retry;

const SYSTEM_PROMPT: &str = "You answer questions about SpaceX launches, Starship flight tests, \
booster catches and Raptor engines. Use only the provided context. If the context does not \
contain the answer, say so.";

/// Generates a natural-language answer for a fully assembled prompt.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    fn model_name(&self) -> &str;
    /// Prompt budget in tokens; the engine trims retrieved context to fit.
    fn context_window(&self) -> usize;
    async fn complete(&self, prompt: &str) -> RagResult<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// ============ OpenAI-compatible ============

pub struct OpenAiChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    context_window: usize,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_retries: u32,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> RagResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RagError::AnswerProvider(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            url: format!("{}/chat/completions", config.base_url()),
            api_key,
            model: config.model.clone(),
            context_window: config.context_window,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_content(self) -> RagResult<String> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagError::AnswerProvider("chat response had no choices".to_string()))?;
        choice.message.content.ok_or_else(|| {
            RagError::AnswerProvider("chat response choice had no message content".to_string())
        })
    }
}

#[async_trait]
impl AnswerProvider for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn context_window(&self) -> usize {
        self.context_window
    }

    async fn complete(&self, prompt: &str) -> RagResult<String> {
        let started = Instant::now();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "POST {}", self.url);

        let response = send_with_retry("Chat API", self.max_retries, Duration::from_secs(1), || {
            self.client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await
        .map_err(RagError::AnswerProvider)?;

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            RagError::AnswerProvider(format!(
                "invalid chat response: {}; expected `choices[0].message.content`",
                e
            ))
        })?;

        let content = parsed.into_content()?;

        debug!(
            model = %self.model,
            latency_ms = started.elapsed().as_millis() as u64,
            answer_len = content.len(),
            "chat completion done"
        );
        Ok(content)
    }
}

// ============ Ollama ============

pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    context_window: usize,
    temperature: Option<f32>,
    max_retries: u32,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> RagResult<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.base_url(),
            model: config.model.clone(),
            context_window: config.context_window,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[async_trait]
impl AnswerProvider for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn context_window(&self) -> usize {
        self.context_window
    }

    async fn complete(&self, prompt: &str) -> RagResult<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
            options: self
                .temperature
                .map(|t| serde_json::json!({ "temperature": t })),
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "POST {}", url);

        let response = send_with_retry("Ollama chat", self.max_retries, Duration::from_secs(1), || {
            self.client.post(&url).json(&body).send()
        })
        .await
        .map_err(|e| {
            RagError::AnswerProvider(format!("{} (is Ollama running at {}?)", e, self.base_url))
        })?;

        let parsed: OllamaChatResponse = response.json().await.map_err(|e| {
            RagError::AnswerProvider(format!("invalid Ollama chat response: {}", e))
        })?;
        Ok(parsed.message.content)
    }
}

fn build_client(timeout_secs: u64) -> RagResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::AnswerProvider(format!("failed to build HTTP client: {}", e)))
}

/// Create the configured [`AnswerProvider`].
pub fn create_answer_provider(config: &LlmConfig) -> RagResult<Arc<dyn AnswerProvider>> {
    let provider: Arc<dyn AnswerProvider> = match config.provider {
        LlmKind::OpenAi => Arc::new(OpenAiChat::new(config)?),
        LlmKind::Ollama => Arc::new(OllamaChat::new(config)?),
    };
    info!(provider = ?config.provider, model = provider.model_name(), "answer provider ready");
    Ok(provider)
}
