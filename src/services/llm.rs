//! [`TextGenerator`] backed by an edgequake-llm provider.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) spaces out retries: with 500 ms base and
//! 2 retries the wait sequence is 500 ms → 1 s. Each attempt is bounded by
//! `api_timeout_secs`; a timed-out attempt counts as a failed attempt.

use crate::config::CompilationConfig;
use crate::error::{ServiceError, StorybookError};
use crate::services::{TextGenerator, TextRequest};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

const DEFAULT_TEXT_MODEL: &str = "gpt-4.1-mini";

/// Adapter from the crate's [`TextGenerator`] contract to an [`LLMProvider`].
pub struct LlmTextGenerator {
    provider: Arc<dyn LLMProvider>,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
    temperature: f32,
    max_tokens: usize,
}

impl LlmTextGenerator {
    /// Wrap a provider using the retry and sampling knobs from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &CompilationConfig) -> Self {
        Self {
            provider,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn options(&self, request: &TextRequest) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(request.temperature.unwrap_or(self.temperature)),
            max_tokens: Some(request.max_tokens.unwrap_or(self.max_tokens)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(&self, request: TextRequest) -> Result<String, ServiceError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(&request.system),
            ChatMessage::user(&request.user),
        ];
        let options = self.options(&request);

        let mut last_err = ServiceError::Request("no attempt made".into());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Text generation: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Text generation: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    warn!("Text generation: attempt {} failed — {}", attempt + 1, e);
                    last_err = ServiceError::Request(e.to_string());
                }
                Err(_) => {
                    warn!(
                        "Text generation: attempt {} timed out after {}s",
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_err = ServiceError::Timeout {
                        secs: self.api_timeout_secs,
                    };
                }
            }
        }

        Err(last_err)
    }
}

/// Resolve the text generator, from most-specific to least-specific.
///
/// 1. **Pre-built generator** (`config.text_generator`) — used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is present.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_text_generator(
    config: &CompilationConfig,
) -> Result<Arc<dyn TextGenerator>, StorybookError> {
    if let Some(ref generator) = config.text_generator {
        return Ok(Arc::clone(generator));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmTextGenerator::new(provider, config)))
}

fn resolve_provider(config: &CompilationConfig) -> Result<Arc<dyn LLMProvider>, StorybookError> {
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_TEXT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_TEXT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| StorybookError::ProviderNotConfigured {
            service: "Text",
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, StorybookError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        StorybookError::ProviderNotConfigured {
            service: "Text",
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
