//! Model server HTTP client with retry logic and connection pooling

use std::future::Future;
use std::time::Duration;

use playhead_shared_config::{LlmConfig, LlmProvider};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};
use crate::models::{ChatMessage, GenerateOptions, ToolDefinition};
use crate::{ollama, openai, DeltaStream};

/// Maximum error body size to prevent memory exhaustion
const MAX_ERROR_BODY_SIZE: usize = 1000;

/// Default retry configuration
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Chat client speaking either the OpenAI-compatible or the Ollama protocol
#[derive(Debug, Clone)]
pub struct LlmClient {
    /// HTTP client with connection pool
    http_client: Client,
    /// Configuration (the API key is redacted by its Debug impl)
    config: LlmConfig,
    /// Number of retry attempts for transient failures
    retry_attempts: u32,
    /// Base delay for exponential backoff (milliseconds)
    retry_base_delay_ms: u64,
}

impl LlmClient {
    /// Create a new client from configuration
    ///
    /// No overall timeout is set on the pool: streamed completions may run
    /// longer than a single request should. Non-streaming calls set their own.
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(LlmError::HttpError)?;

        Ok(Self {
            http_client,
            config: config.clone(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        })
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, attempts: u32, base_delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Execute an async operation with retry logic
    async fn with_retry<T, F, Fut>(&self, operation: F) -> LlmResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = LlmResult<T>>,
    {
        if self.retry_attempts == 0 {
            return operation().await;
        }

        let mut last_error = None;

        for attempt in 0..self.retry_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    } else if attempt < self.retry_attempts - 1 {
                        let delay = self.retry_base_delay_ms * 2_u64.pow(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max_attempts = self.retry_attempts,
                            delay_ms = delay,
                            error = %e,
                            "Retrying after transient error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        last_error = Some(e);
                    } else {
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.retry_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    /// Truncate error body to prevent memory exhaustion
    /// Safely handles UTF-8 boundaries to avoid panics on multi-byte characters
    fn truncate_error_body(body: String) -> String {
        if body.len() <= MAX_ERROR_BODY_SIZE {
            return body;
        }

        let truncate_at = body
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= MAX_ERROR_BODY_SIZE)
            .last()
            .unwrap_or(0);

        format!("{}... (truncated)", &body[..truncate_at])
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::ConnectionRefused(self.config.url.clone())
        } else if e.is_timeout() {
            LlmError::Timeout(self.config.timeout_secs)
        } else {
            LlmError::HttpError(e)
        }
    }

    /// Turn a non-success response into the matching error
    async fn check_status(&self, response: Response, model: &str) -> LlmResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = Self::truncate_error_body(response.text().await.unwrap_or_default());

        Err(match status.as_u16() {
            401 | 403 => LlmError::Unauthorized(status.as_u16()),
            429 => LlmError::RateLimited,
            404 if body.contains("model") && body.contains("not found") => {
                LlmError::ModelNotFound(model.to_string())
            }
            code => LlmError::ApiError { status: code, body },
        })
    }

    async fn post_json<B: Serialize>(
        &self,
        body: &B,
        model: &str,
        timeout: Option<Duration>,
    ) -> LlmResult<Response> {
        let mut request = self
            .authorized(self.http_client.post(self.config.chat_url()))
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        self.check_status(response, model).await
    }

    fn default_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            top_p: None,
        }
    }

    /// Check if the model server is reachable
    pub async fn health_check(&self) -> LlmResult<bool> {
        let response = self
            .authorized(self.http_client.get(self.config.models_url()))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => Err(self.map_send_error(e)),
        }
    }

    /// Internal completion (single request, no retry)
    async fn complete_internal(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> LlmResult<String> {
        let timeout = Some(Duration::from_secs(self.config.timeout_secs));

        match self.config.provider {
            LlmProvider::OpenAi => {
                let request = openai::CompletionRequest::new(model, messages, &[], options, false);
                let response = self.post_json(&request, model, timeout).await?;
                let body: openai::CompletionResponse = response.json().await?;
                body.into_text()
            }
            LlmProvider::Ollama => {
                let request = ollama::ChatRequest::new(model, messages, &[], options, false);
                let response = self.post_json(&request, model, timeout).await?;
                let body: ollama::ChatChunk = response.json().await?;
                body.into_text()
            }
        }
    }

    /// Non-streaming completion with the chat model
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<GenerateOptions>,
    ) -> LlmResult<String> {
        let model = self.config.model.clone();
        self.complete_with_model(&model, messages, options).await
    }

    /// Non-streaming completion against a specific model, with retry logic
    pub async fn complete_with_model(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        options: Option<GenerateOptions>,
    ) -> LlmResult<String> {
        let options = options.unwrap_or_else(|| self.default_options());

        debug!(
            model = %model,
            message_count = messages.len(),
            "Sending completion request"
        );

        let result = self
            .with_retry(|| self.complete_internal(model, &messages, &options))
            .await?;

        debug!(response_len = result.len(), "Completion received");

        Ok(result)
    }

    /// Stream a tool-enabled chat completion as provider-neutral deltas
    ///
    /// Only the connection phase is retried; once bytes flow, errors are
    /// yielded in the stream and the stream ends.
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> LlmResult<DeltaStream> {
        let options = options.unwrap_or_else(|| self.default_options());
        let model = self.config.model.as_str();

        debug!(
            provider = %self.config.provider,
            model = %model,
            message_count = messages.len(),
            tool_count = tools.len(),
            "Starting streaming chat request"
        );

        let stream = match self.config.provider {
            LlmProvider::OpenAi => {
                let request = openai::CompletionRequest::new(model, messages, tools, &options, true);
                let response = self
                    .with_retry(|| self.post_json(&request, model, None))
                    .await?;
                openai::sse_delta_stream(response.bytes_stream())
            }
            LlmProvider::Ollama => {
                let request = ollama::ChatRequest::new(model, messages, tools, &options, true);
                let response = self
                    .with_retry(|| self.post_json(&request, model, None))
                    .await?;
                ollama::ndjson_delta_stream(response.bytes_stream())
            }
        };

        debug!("Streaming chat response started");

        Ok(stream)
    }
}
