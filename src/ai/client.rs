//! LLM API client module
//!
//! Encapsulates all LLM API interactions for turning text into a slide plan.
//! Each provider gets its own request body and response extraction; transport,
//! status handling and key redaction are shared.

use async_trait::async_trait;
use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content, MessageRole};
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "debug-logs")]
use tracing::debug;

use super::prompt_builder::{build_prompt, sanitize_guidance, system_text};
use super::provider::LlmProvider;
use super::response_parser::parse_slide_plan;
use crate::core::config::AppConfig;
use crate::core::models::SlidePlan;
use crate::core::secret::{ApiKey, redact};
use crate::errors::GenerationError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const TEMPERATURE: f32 = 0.1;

/// Longest slice of an upstream error body kept in our error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4 + 1
}

/// Inputs for one slide-plan request. Borrowed so the key is never copied.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub text: &'a str,
    pub guidance: Option<&'a str>,
    pub tone: &'a str,
    pub provider: LlmProvider,
    pub api_key: &'a ApiKey,
}

/// Produces a [`SlidePlan`] from raw text.
#[async_trait]
pub trait SlidePlanner: Send + Sync {
    async fn plan(&self, request: PlanRequest<'_>) -> Result<SlidePlan, GenerationError>;
}

/// HTTP client for the OpenAI, Anthropic and Gemini APIs.
pub struct LlmClient {
    config: Arc<AppConfig>,
    http: Client,
}

impl LlmClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: Arc<AppConfig>) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .map_err(|e| GenerationError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Sends the transcript to `provider` and returns the model's text output.
    ///
    /// # Errors
    ///
    /// `UpstreamAuth` for 401/403, `UpstreamTimeout` when the call times out,
    /// `UpstreamError` for any other failure status or transport error and
    /// `InvalidLlmResponse` when the reply carries no text.
    pub async fn complete(
        &self,
        provider: LlmProvider,
        api_key: &ApiKey,
        prompt: &[ChatCompletionMessage],
    ) -> Result<String, GenerationError> {
        let estimated_input_tokens = prompt
            .iter()
            .map(|msg| estimate_tokens(&format!("{:?}", msg.content)))
            .sum::<usize>();
        info!(
            provider = %provider,
            model = provider.model(&self.config),
            "Calling LLM API, estimated input tokens: {}",
            estimated_input_tokens
        );

        let request = match provider {
            LlmProvider::OpenAi => self.openai_request(api_key, prompt),
            LlmProvider::Anthropic => self.anthropic_request(api_key, prompt),
            LlmProvider::Gemini => self.gemini_request(api_key, prompt),
        };

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(provider, api_key, &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|e| {
                format!("Failed to read error response body (status {status}): {e}")
            });
            let message = redact(&upstream_message(&error_text), api_key);
            warn!(provider = %provider, status = status.as_u16(), "LLM API returned an error");

            return Err(match status.as_u16() {
                401 | 403 => GenerationError::UpstreamAuth(format!(
                    "{} rejected the API key (status {status}): {message}",
                    provider.display_name()
                )),
                408 | 504 => GenerationError::UpstreamTimeout(format!(
                    "{} timed out (status {status}): {message}",
                    provider.display_name()
                )),
                _ => GenerationError::UpstreamError(format!(
                    "{} API error (status {status}): {message}",
                    provider.display_name()
                )),
            });
        }

        let response_json: Value = response.json().await.map_err(|e| {
            GenerationError::InvalidLlmResponse(redact(
                &format!("Failed to parse {} response: {e}", provider.display_name()),
                api_key,
            ))
        })?;

        let text = match provider {
            LlmProvider::OpenAi => extract_openai_text(&response_json),
            LlmProvider::Anthropic => extract_anthropic_text(&response_json),
            LlmProvider::Gemini => extract_gemini_text(&response_json),
        };

        let text = text.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            GenerationError::InvalidLlmResponse(format!(
                "No text in {} response",
                provider.display_name()
            ))
        })?;

        info!(provider = %provider, "LLM response received: {} characters", text.len());
        Ok(text)
    }

    fn transport_error(
        &self,
        provider: LlmProvider,
        api_key: &ApiKey,
        error: &reqwest::Error,
    ) -> GenerationError {
        if error.is_timeout() {
            GenerationError::UpstreamTimeout(format!(
                "{} did not respond within {}s",
                provider.display_name(),
                self.config.llm_timeout_secs
            ))
        } else {
            GenerationError::UpstreamError(redact(
                &format!("{} request failed: {error}", provider.display_name()),
                api_key,
            ))
        }
    }

    fn endpoint(&self, provider: LlmProvider, path: &str) -> String {
        format!(
            "{}{}",
            provider.base_url(&self.config).trim_end_matches('/'),
            path
        )
    }

    fn openai_request(&self, api_key: &ApiKey, prompt: &[ChatCompletionMessage]) -> RequestBuilder {
        let body = openai_request_body(
            LlmProvider::OpenAi.model(&self.config),
            prompt,
            self.config.max_output_tokens,
        );
        self.http
            .post(self.endpoint(LlmProvider::OpenAi, "/v1/chat/completions"))
            .bearer_auth(api_key.expose())
            .json(&body)
    }

    fn anthropic_request(
        &self,
        api_key: &ApiKey,
        prompt: &[ChatCompletionMessage],
    ) -> RequestBuilder {
        let body = anthropic_request_body(
            LlmProvider::Anthropic.model(&self.config),
            prompt,
            self.config.max_output_tokens,
        );
        self.http
            .post(self.endpoint(LlmProvider::Anthropic, "/v1/messages"))
            .header("x-api-key", api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
    }

    fn gemini_request(&self, api_key: &ApiKey, prompt: &[ChatCompletionMessage]) -> RequestBuilder {
        let model = LlmProvider::Gemini.model(&self.config);
        let body = gemini_request_body(prompt, self.config.max_output_tokens);
        // Key goes in a header: query strings end up in reqwest error messages.
        self.http
            .post(self.endpoint(
                LlmProvider::Gemini,
                &format!("/v1beta/models/{model}:generateContent"),
            ))
            .header("x-goog-api-key", api_key.expose())
            .json(&body)
    }
}

#[async_trait]
impl SlidePlanner for LlmClient {
    async fn plan(&self, request: PlanRequest<'_>) -> Result<SlidePlan, GenerationError> {
        if request.text.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "Text is required".to_string(),
            ));
        }

        let guidance = request.guidance.map(sanitize_guidance).transpose()?;
        let prompt = build_prompt(
            request.text,
            guidance.as_deref(),
            request.tone,
            self.config.max_input_chars,
        );

        #[cfg(feature = "debug-logs")]
        debug!("Using slide prompt:\n{:?}", prompt);

        let raw = self
            .complete(request.provider, request.api_key, &prompt)
            .await?;

        #[cfg(feature = "debug-logs")]
        debug!("Raw LLM response:\n{}", raw);

        let plan = parse_slide_plan(&raw)?;
        info!("Successfully parsed {} slides", plan.slides.len());
        Ok(plan)
    }
}

fn role_str(role: &MessageRole) -> &'static str {
    match role {
        MessageRole::system => "system",
        MessageRole::user => "user",
        MessageRole::assistant => "assistant",
        MessageRole::function => "function",
        MessageRole::tool => "tool",
    }
}

fn message_text(message: &ChatCompletionMessage) -> Option<&str> {
    match &message.content {
        Content::Text(text) => Some(text),
        Content::ImageUrl(_) => None,
    }
}

/// Chat Completions body.
pub(crate) fn openai_request_body(
    model: &str,
    prompt: &[ChatCompletionMessage],
    max_tokens: u32,
) -> Value {
    let messages: Vec<Value> = prompt
        .iter()
        .filter_map(|msg| {
            message_text(msg).map(|text| json!({ "role": role_str(&msg.role), "content": text }))
        })
        .collect();

    json!({
        "model": model,
        "messages": messages,
        "temperature": TEMPERATURE,
        "max_tokens": max_tokens
    })
}

/// Messages API body; system prompt moves to the top-level `system` field.
pub(crate) fn anthropic_request_body(
    model: &str,
    prompt: &[ChatCompletionMessage],
    max_tokens: u32,
) -> Value {
    let messages: Vec<Value> = prompt
        .iter()
        .filter(|msg| matches!(msg.role, MessageRole::user | MessageRole::assistant))
        .filter_map(|msg| {
            message_text(msg).map(|text| json!({ "role": role_str(&msg.role), "content": text }))
        })
        .collect();

    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "temperature": TEMPERATURE,
        "messages": messages
    });
    let system = system_text(prompt);
    if !system.is_empty() {
        body["system"] = json!(system);
    }
    body
}

/// generateContent body; Gemini names the assistant role `model`.
pub(crate) fn gemini_request_body(prompt: &[ChatCompletionMessage], max_tokens: u32) -> Value {
    let contents: Vec<Value> = prompt
        .iter()
        .filter(|msg| matches!(msg.role, MessageRole::user | MessageRole::assistant))
        .filter_map(|msg| {
            let role = if matches!(msg.role, MessageRole::assistant) {
                "model"
            } else {
                "user"
            };
            message_text(msg).map(|text| json!({ "role": role, "parts": [{ "text": text }] }))
        })
        .collect();

    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": TEMPERATURE,
            "maxOutputTokens": max_tokens
        }
    });
    let system = system_text(prompt);
    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

pub(crate) fn extract_openai_text(response: &Value) -> Option<String> {
    response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(ToString::to_string)
}

pub(crate) fn extract_anthropic_text(response: &Value) -> Option<String> {
    let blocks = response.get("content").and_then(|c| c.as_array())?;
    let collected: Vec<&str> = blocks
        .iter()
        .filter(|block| {
            block
                .get("type")
                .and_then(|t| t.as_str())
                .is_none_or(|t| t == "text")
        })
        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
        .collect();
    if collected.is_empty() {
        None
    } else {
        Some(collected.join(""))
    }
}

pub(crate) fn extract_gemini_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array())?;
    let collected: Vec<&str> = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    if collected.is_empty() {
        None
    } else {
        Some(collected.join(""))
    }
}

/// Pulls `error.message` out of a provider error body, falling back to the raw text.
pub(crate) fn upstream_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    if message.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = message.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}...")
    } else {
        message
    }
}
