use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{Embedder, Generator, ProviderError};
use crate::config::ProviderConfig;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
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

/// Shared HTTP plumbing for both endpoints.
#[derive(Debug, Clone)]
struct ApiClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl ApiClient {
    fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let api_key = config.api_key();
        if api_key.is_none() {
            log::warn!(
                "{} is not set; requests to {} are sent without credentials",
                config.api_key_env,
                config.api_base
            );
        }

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.api_base, path);
        log::debug!("POST {url}");

        match &self.api_key {
            Some(key) => self.client.post(url).bearer_auth(key),
            None => self.client.post(url),
        }
    }

    /// Posts `body` as JSON and decodes the reply. A reply that is not the
    /// expected JSON is an `InvalidResponse`, not a transport error.
    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = self
            .post(path)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        serde_json::from_slice(&bytes)
            .map_err(|err| ProviderError::InvalidResponse(format!("{path}: {err}")))
    }
}

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    api: ApiClient,
}

impl OpenAiEmbedder {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            api: ApiClient::new(config)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let clean = prepare_embedding_input(text).ok_or(ProviderError::EmptyText)?;

        let response: EmbeddingResponse = self
            .api
            .post_json(
                "/embeddings",
                &EmbeddingRequest {
                    model: &self.api.model,
                    input: [clean.as_str()],
                },
            )
            .await?;

        Ok(first_embedding(response))
    }
}

/// Generator backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    api: ApiClient,
}

impl OpenAiGenerator {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            api: ApiClient::new(config)?,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let response: ChatResponse = self
            .api
            .post_json(
                "/chat/completions",
                &ChatRequest {
                    model: &self.api.model,
                    messages: [ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                },
            )
            .await?;

        Ok(first_choice_text(response))
    }
}

/// Trims the input and folds newlines into spaces. `None` when nothing is left.
fn prepare_embedding_input(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace(['\r', '\n'], " "))
}

fn first_embedding(response: EmbeddingResponse) -> Vec<f32> {
    let mut data = response.data;
    data.sort_by_key(|item| item.index.unwrap_or(usize::MAX));
    data.into_iter()
        .next()
        .map(|item| item.embedding)
        .unwrap_or_default()
}

fn first_choice_text(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default()
}
