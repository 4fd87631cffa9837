//! Remote generator using OpenAI-compatible APIs
//!
//! Works with OpenAI, OpenRouter and Ollama's `/v1` endpoint. The API key is
//! read from the environment variable named in the config; providers that
//! need no key (Ollama) send no Authorization header.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::error::{KindredError, Result};
use crate::generation::Generator;
use crate::personality::{ChatMessage, InstructionEnvelope};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Generator backed by a chat-completions endpoint
#[derive(Debug)]
pub struct RemoteGenerator {
    client: Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
    initial_backoff: Duration,
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl RemoteGenerator {
    /// Create a generator, reading the API key from the configured env var.
    ///
    /// Fails if the provider needs a key and the variable is not set.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = match config.resolved_api_key_env() {
            Some(var) => Some(env::var(&var).map_err(|_| {
                KindredError::Config(format!("API key env var '{var}' not set"))
            })?),
            None => None,
        };
        Self::with_api_key(config, api_key)
    }

    /// Create a generator with an explicit key (or none)
    pub fn with_api_key(config: &GenerationConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KindredError::Config(format!("Failed to build HTTP client: {e}")))?;

        let api_url = config.resolved_api_url();
        info!(
            "RemoteGenerator initialized with model: {}, api_url: {}",
            config.model, api_url
        );

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            api_key: api_key.filter(|key| !key.is_empty()),
            max_retries: config.max_retries.max(1),
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Override the first retry delay (doubles after each attempt)
    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Call the API with exponential backoff on rate limiting and transport errors
    async fn call_api(&self, request: &ChatCompletionRequest<'_>) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        debug!("Calling chat completions at: {}", url);

        let mut last_error = None;
        let mut delay = self.initial_backoff;

        for attempt in 1..=self.max_retries {
            let mut builder = self.client.post(&url).json(request);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        warn!(
                            "Rate limited on attempt {}/{}",
                            attempt, self.max_retries
                        );
                        last_error = Some("rate limited".to_string());
                    } else if !status.is_success() {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        return Err(KindredError::ProviderUnavailable(format!(
                            "API returned {status}: {error_text}"
                        )));
                    } else {
                        let completion: ChatCompletionResponse =
                            response.json().await.map_err(|e| {
                                KindredError::ProviderUnavailable(format!(
                                    "Malformed completion: {e}"
                                ))
                            })?;

                        return completion
                            .choices
                            .into_iter()
                            .next()
                            .map(|c| c.message.content.trim().to_string())
                            .filter(|content| !content.is_empty())
                            .ok_or_else(|| {
                                KindredError::ProviderUnavailable("Empty response".to_string())
                            });
                    }
                }
                Err(e) => {
                    warn!(
                        "Request failed on attempt {}/{}: {}",
                        attempt, self.max_retries, e
                    );
                    last_error = Some(e.to_string());
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(KindredError::ProviderUnavailable(format!(
            "Failed after {} attempts: {}",
            self.max_retries,
            last_error.unwrap_or_else(|| "Unknown error".to_string())
        )))
    }
}

#[async_trait]
impl Generator for RemoteGenerator {
    async fn generate(&self, envelope: &InstructionEnvelope) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: envelope.messages(),
            temperature: envelope.temperature,
            max_tokens: envelope.max_tokens,
        };
        self.call_api(&request).await
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
