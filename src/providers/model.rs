/// Clients for locally-hosted inference servers
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReviewConfig;

/// Supported local inference backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelBackend {
    /// llama.cpp HTTP server (`llama-server`)
    LlamaCpp,
    /// Ollama daemon
    Ollama,
    /// Canned response, no network. Used by tests and offline runs.
    Stub,
}

impl std::fmt::Display for ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelBackend::LlamaCpp => "llama-cpp",
            ModelBackend::Ollama => "ollama",
            ModelBackend::Stub => "stub",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ModelBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "llama-cpp" | "llamacpp" | "llama" => Ok(ModelBackend::LlamaCpp),
            "ollama" => Ok(ModelBackend::Ollama),
            "stub" => Ok(ModelBackend::Stub),
            _ => Err(anyhow::anyhow!(
                "Invalid backend: {}. Supported: llama-cpp, ollama, stub",
                s
            )),
        }
    }
}

impl ModelBackend {
    /// Default base URL for this backend
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ModelBackend::LlamaCpp => "http://127.0.0.1:8080",
            ModelBackend::Ollama => "http://127.0.0.1:11434",
            ModelBackend::Stub => "",
        }
    }
}

/// HTTP client for the configured inference server
pub struct ModelClient {
    client: Client,
    backend: ModelBackend,
    base_url: String,
    model: String,
    temperature: f32,
}

impl ModelClient {
    pub fn new(config: &ReviewConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            backend: config.backend,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Send one prompt to the inference server and return its raw text.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        match self.backend {
            ModelBackend::LlamaCpp => self.complete_llama_cpp(prompt, max_tokens).await,
            ModelBackend::Ollama => self.complete_ollama(prompt, max_tokens).await,
            ModelBackend::Stub => Err(anyhow::anyhow!(
                "stub backend has no HTTP client; construct a StubModel instead"
            )),
        }
    }

    /// llama.cpp server `/completion` endpoint
    async fn complete_llama_cpp(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request_body = serde_json::json!({
            "prompt": prompt,
            "n_predict": max_tokens,
            "temperature": self.temperature,
            "stop": ["</s>"],
            "stream": false
        });

        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to llama.cpp server")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("llama.cpp server error: {}", error_text));
        }

        #[derive(Deserialize)]
        struct LlamaCppResponse {
            content: String,
        }

        let api_response: LlamaCppResponse = response
            .json()
            .await
            .context("Failed to parse llama.cpp response")?;

        Ok(api_response.content)
    }

    /// Ollama `/api/generate` endpoint
    async fn complete_ollama(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": max_tokens
            }
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Ollama error: {}", error_text));
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            response: String,
        }

        let api_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(api_response.response)
    }
}

/// Canned model responses with an invocation counter, for tests and
/// offline runs.
pub struct StubModel {
    response: String,
    calls: Arc<AtomicUsize>,
}

impl StubModel {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared handle to the invocation counter. Reads stay valid after the
    /// stub has been moved into a `ModelHandle`.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn complete(&self, _prompt: &str, _max_tokens: u32) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// The single call site into an inference engine: text in, text out.
pub enum ModelHandle {
    Http(ModelClient),
    Stub(StubModel),
}

impl ModelHandle {
    /// Build a handle from configuration. The stub backend reads its canned
    /// response from `stub_response_file` when set, otherwise returns an
    /// empty payload.
    pub fn from_config(config: &ReviewConfig) -> Result<Self> {
        match config.backend {
            ModelBackend::Stub => {
                let response = match &config.stub_response_file {
                    Some(path) => std::fs::read_to_string(path).with_context(|| {
                        format!("Failed to read stub response file {}", path.display())
                    })?,
                    None => String::new(),
                };
                Ok(ModelHandle::Stub(StubModel::new(response)))
            }
            _ => Ok(ModelHandle::Http(ModelClient::new(config)?)),
        }
    }

    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        match self {
            ModelHandle::Http(client) => client.complete(prompt, max_tokens).await,
            ModelHandle::Stub(stub) => Ok(stub.complete(prompt, max_tokens)),
        }
    }
}
