//! Summarization backends.
//!
//! A [`Summarizer`] turns a bounded document text plus the user's prompt into
//! a summary. Two backends ship with the crate:
//!
//! * [`LlmSummarizer`]: any edgequake-llm chat provider (OpenAI for the
//!   `gpt4` and `gpt4mini` selectors). Authentication failures are reported
//!   as [`ProviderError::InvalidCredentials`].
//! * [`TogetherSummarizer`]: the Together AI chat-completions endpoint over
//!   plain JSON HTTP. Non-2xx answers become [`ProviderError::Http`] with the
//!   status code; 401 is reported as invalid credentials.
//!
//! Both receive the same single user message (see
//! [`crate::prompts::summary_message`]) and the shared
//! [`GenerationOptions`]. An empty or whitespace-only prompt is rejected by
//! the provided [`Summarizer::summarize`] method before any request is built.

use crate::config::{GenerationOptions, ProviderFamily, SummarizerKind};
use crate::error::{ProviderError, SummaryError};
use crate::prompts::summary_message;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Default Together AI API root.
pub const TOGETHER_BASE_URL: &str = "https://api.together.ai/v1";

/// Reject empty or whitespace-only prompts.
pub fn validate_prompt(prompt: &str) -> Result<(), SummaryError> {
    if prompt.trim().is_empty() {
        return Err(SummaryError::MissingPrompt);
    }
    Ok(())
}

/// A summarization provider.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Provider name used in logs and error messages.
    fn provider(&self) -> &str;

    /// Vendor model id.
    fn model_id(&self) -> &str;

    /// Send one fully-built user message and return the completion text.
    async fn complete(
        &self,
        message: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;

    /// Summarise `text` according to `prompt`.
    async fn summarize(
        &self,
        text: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, SummaryError> {
        validate_prompt(prompt)?;
        let message = summary_message(prompt, text);
        let start = Instant::now();
        let summary = self.complete(&message, options).await?;
        debug!(
            "{} ({}) returned {} chars in {:?}",
            self.provider(),
            self.model_id(),
            summary.len(),
            start.elapsed()
        );
        Ok(summary)
    }
}

// ── edgequake-llm backend ────────────────────────────────────────────────

/// Summarizer over an edgequake-llm chat provider.
pub struct LlmSummarizer {
    provider_name: String,
    model_id: String,
    provider: Arc<dyn LLMProvider>,
}

impl LlmSummarizer {
    pub fn new(
        provider_name: impl Into<String>,
        model_id: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            model_id: model_id.into(),
            provider,
        }
    }

    /// Build the backend for an OpenAI-family selector.
    ///
    /// The provider reads `OPENAI_API_KEY` from the environment.
    pub fn for_kind(kind: SummarizerKind) -> Result<Self, ProviderError> {
        let provider_name = match kind.family() {
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Together => {
                return Err(ProviderError::NotConfigured {
                    selector: kind.selector().to_string(),
                    hint: "Together AI is served by TogetherSummarizer".to_string(),
                })
            }
        };
        let provider = ProviderFactory::create_llm_provider(provider_name, kind.model_id())
            .map_err(|e| ProviderError::NotConfigured {
                selector: kind.selector().to_string(),
                hint: format!("{e}"),
            })?;
        Ok(Self::new(provider_name, kind.model_id(), provider))
    }
}

impl std::fmt::Debug for LlmSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSummarizer")
            .field("provider", &self.provider_name)
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

/// Status 401 as a whole number, or the usual rejected-key phrasing.
static RE_AUTH_FAILURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b401\b|\bunauthori[sz]ed\b|\bauthentication|\b(?:invalid|incorrect)[ _]api[ _]key\b",
    )
    .unwrap()
});

/// True when a provider error message describes rejected credentials.
fn is_auth_failure(message: &str) -> bool {
    RE_AUTH_FAILURE.is_match(message)
}

/// Typed auth errors first; providers that only report a status in the
/// message text fall back to [`is_auth_failure`].
fn is_auth_error(err: &LlmError) -> bool {
    matches!(err, LlmError::AuthError(_)) || is_auth_failure(&err.to_string())
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    fn provider(&self) -> &str {
        &self.provider_name
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(
        &self,
        message: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let messages = vec![ChatMessage::user(message)];
        let options = CompletionOptions {
            temperature: Some(options.temperature),
            max_tokens: Some(options.max_output_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    self.model_id, response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content.trim().to_string())
            }
            Err(e) => {
                let detail = format!("{}", e);
                warn!("{} ({}) failed: {}", self.provider_name, self.model_id, detail);
                if is_auth_error(&e) {
                    Err(ProviderError::InvalidCredentials {
                        provider: self.provider_name.clone(),
                    })
                } else {
                    Err(ProviderError::Unexpected {
                        provider: self.provider_name.clone(),
                        detail,
                    })
                }
            }
        }
    }
}

// ── Together AI JSON backend ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Summarizer over Together AI's OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct TogetherSummarizer {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    model_id: String,
}

impl TogetherSummarizer {
    const PROVIDER: &'static str = "togetherai";

    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured {
                selector: SummarizerKind::TogetherAi.selector().to_string(),
                hint: "TogetherAI API key is missing. Set TOGETHERAI_API_KEY.".to_string(),
            });
        }
        Ok(Self {
            http_client: reqwest::Client::new(),
            api_key,
            base_url: TOGETHER_BASE_URL.to_string(),
            model_id: model_id.into(),
        })
    }

    /// Backend for the `togetherai` selector.
    pub fn for_kind(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(api_key, SummarizerKind::TogetherAi.model_id())
    }

    /// Point at a different API root (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn unexpected(detail: impl Into<String>) -> ProviderError {
        ProviderError::Unexpected {
            provider: Self::PROVIDER.to_string(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Debug for TogetherSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TogetherSummarizer")
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Summarizer for TogetherSummarizer {
    fn provider(&self) -> &str {
        Self::PROVIDER
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(
        &self,
        message: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model_id,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: message,
            }],
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Together AI request failed: {}", e);
                Self::unexpected(e.to_string())
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::InvalidCredentials {
                provider: Self::PROVIDER.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Together AI API error {}: {}", status, body);
            return Err(ProviderError::Http {
                provider: Self::PROVIDER.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::unexpected(format!("malformed response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| Self::unexpected("response contained no choices"))
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Backends keyed by public model selector.
#[derive(Clone, Default)]
pub struct SummarizerSet {
    backends: HashMap<SummarizerKind, Arc<dyn Summarizer>>,
}

impl SummarizerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the backend serving `kind`.
    pub fn with(mut self, kind: SummarizerKind, summarizer: Arc<dyn Summarizer>) -> Self {
        self.backends.insert(kind, summarizer);
        self
    }

    pub fn get(&self, kind: SummarizerKind) -> Result<Arc<dyn Summarizer>, ProviderError> {
        self.backends
            .get(&kind)
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured {
                selector: kind.selector().to_string(),
                hint: match kind.family() {
                    ProviderFamily::OpenAi => "Set OPENAI_API_KEY.".to_string(),
                    ProviderFamily::Together => "Set TOGETHERAI_API_KEY.".to_string(),
                },
            })
    }

    /// Selectors with a registered backend, in table order.
    pub fn kinds(&self) -> Vec<SummarizerKind> {
        SummarizerKind::ALL
            .into_iter()
            .filter(|k| self.backends.contains_key(k))
            .collect()
    }
}

impl std::fmt::Debug for SummarizerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizerSet")
            .field("kinds", &self.kinds())
            .finish()
    }
}
