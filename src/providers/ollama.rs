//! Ollama API client and the providers built on it

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

use super::embedding::EmbeddingProvider;
use super::llm::GenerationProvider;

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: LlmConfig,
    /// Retry policy for transient failures
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Raw request body for the legacy passthrough endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(config: &LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            retry: RetryPolicy::exponential(config.max_retries),
            config: config.clone(),
        }
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding using Ollama with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let text = text.to_string();
        let model = self.config.embed_model.clone();
        let client = self.client.clone();

        self.retry
            .run("embedding request", || {
                let url = url.clone();
                let text = text.clone();
                let model = model.clone();
                let client = client.clone();

                async move {
                    let request = EmbedRequest {
                        model,
                        prompt: text,
                    };

                    let response = client
                        .post(&url)
                        .json(&request)
                        .send()
                        .await
                        .map_err(|e| Error::Llm(format!("Embedding request failed: {}", e)))?;

                    if !response.status().is_success() {
                        return Err(Error::Llm(format!(
                            "Embedding failed: HTTP {}",
                            response.status()
                        )));
                    }

                    let embed_response: EmbedResponse = response.json().await.map_err(|e| {
                        Error::Llm(format!("Failed to parse embedding response: {}", e))
                    })?;

                    Ok(embed_response.embedding)
                }
            })
            .await
    }

    /// Generate a completion with retry (non-streaming, low temperature)
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);
        let prompt = prompt.to_string();
        let model = self.config.generate_model.clone();
        let temperature = self.config.temperature;
        let client = self.client.clone();

        self.retry
            .run("generation request", || {
                let url = url.clone();
                let prompt = prompt.clone();
                let model = model.clone();
                let client = client.clone();

                async move {
                    let request = GenerateRequest {
                        model,
                        prompt,
                        stream: false,
                        options: GenerateOptions { temperature },
                    };

                    let response = client
                        .post(&url)
                        .json(&request)
                        .send()
                        .await
                        .map_err(|e| Error::Llm(format!("Generation request failed: {}", e)))?;

                    if !response.status().is_success() {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::Llm(format!(
                            "Generation failed: HTTP {} - {}",
                            status, body
                        )));
                    }

                    let generate_response: GenerateResponse =
                        response.json().await.map_err(|e| {
                            Error::Llm(format!("Failed to parse generation response: {}", e))
                        })?;

                    Ok(generate_response.response)
                }
            })
            .await
    }

    /// Proxy a request to Ollama and return the raw NDJSON lines joined by
    /// newlines, exactly as the upstream API produced them.
    pub async fn generate_raw(&self, request: &RawGenerateRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Passthrough request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Llm(format!(
                "Passthrough failed: HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Llm(format!("Failed to read passthrough body: {}", e)))?;

        let mut raw = String::new();
        for line in body.lines() {
            if !line.is_empty() {
                raw.push_str(line);
                raw.push('\n');
            }
        }
        Ok(raw)
    }

    /// Proxy a request to Ollama and concatenate the `response` field of each
    /// NDJSON line into a single completion string.
    pub async fn generate_formatted(&self, request: &RawGenerateRequest) -> Result<String> {
        let raw = self.generate_raw(request).await?;

        let mut formatted = String::new();
        for line in raw.lines() {
            if let Ok(chunk) = serde_json::from_str::<GenerateResponse>(line) {
                formatted.push_str(&chunk.response);
            }
        }

        Ok(format!("{}\n", formatted.trim()))
    }

    /// Generate a streaming completion (returns text chunks as they arrive)
    pub async fn generate_stream(
        &self,
        prompt: &str,
    ) -> Result<impl futures_util::Stream<Item = Result<String>>> {
        let url = format!("{}/api/generate", self.config.base_url);

        #[derive(Serialize)]
        struct StreamRequest {
            model: String,
            prompt: String,
            stream: bool,
            options: GenerateOptions,
        }

        let request = StreamRequest {
            model: self.config.generate_model.clone(),
            prompt: prompt.to_string(),
            stream: true,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Stream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Llm(format!(
                "Stream failed: HTTP {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct StreamChunk {
            response: String,
        }

        let stream = response.bytes_stream().map(move |chunk| {
            let bytes = chunk.map_err(|e| Error::Llm(format!("Stream error: {}", e)))?;
            let text = String::from_utf8_lossy(&bytes);

            // Parse NDJSON
            let mut output = String::new();
            for line in text.lines() {
                if let Ok(chunk) = serde_json::from_str::<StreamChunk>(line) {
                    output.push_str(&chunk.response);
                }
            }

            Ok(output)
        });

        Ok(stream)
    }

    /// Embedding model name
    pub fn embed_model(&self) -> &str {
        &self.config.embed_model
    }

    /// Generation model name
    pub fn generate_model(&self) -> &str {
        &self.config.generate_model
    }
}

/// Ollama embedding provider
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
    model: String,
}

impl OllamaEmbedder {
    /// Create from an existing client
    pub fn new(client: Arc<OllamaClient>, dimensions: usize) -> Self {
        let model = client.embed_model().to_string();
        Self {
            client,
            dimensions,
            model,
        }
    }

    /// Model this embedder targets
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama generation provider
pub struct OllamaGenerator {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaGenerator {
    /// Create from an existing client
    pub fn new(client: Arc<OllamaClient>) -> Self {
        let model = client.generate_model().to_string();
        Self { client, model }
    }

    /// Get the underlying client for streaming support
    pub fn client(&self) -> &Arc<OllamaClient> {
        &self.client
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client.generate(prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
