use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Provider;
use crate::config::LlmConfig;
use crate::error::{RagError, Result};

/// Text completion service used to synthesize answers.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generator backed by a non-streaming Ollama or OpenAI-compatible chat API.
pub struct HttpGenerator {
    client: reqwest::Client,
    config: LlmConfig,
    provider: Provider,
}

impl HttpGenerator {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Result<Self> {
        let provider = Provider::parse(&config.provider)?;
        Ok(Self {
            client,
            config,
            provider,
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self.provider {
            Provider::Ollama => call_ollama(&self.client, &self.config, prompt).await,
            Provider::OpenAi => call_openai(&self.client, &self.config, prompt).await,
        }
    }
}

fn service_error(context: &str, e: impl std::fmt::Display) -> RagError {
    RagError::GenerationService(format!("{context}: {e}"))
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

async fn call_ollama(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url);

    let req = OllamaChatRequest {
        model: config.chat_model.clone(),
        messages: vec![Message::user(prompt)],
        stream: false,
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .map_err(|e| service_error("failed to call Ollama chat API", e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(RagError::GenerationService(format!(
            "Ollama chat API returned {status}: {body}"
        )));
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .map_err(|e| service_error("failed to parse Ollama chat response", e))?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

async fn call_openai(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages: vec![Message::user(prompt)],
        temperature: 0.1,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .map_err(|e| service_error("failed to call OpenAI chat API", e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(RagError::GenerationService(format!(
            "OpenAI chat API returned {status}: {body}"
        )));
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .map_err(|e| service_error("failed to parse OpenAI chat response", e))?;
    body.choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| RagError::GenerationService("OpenAI chat API returned no choices".into()))
}
