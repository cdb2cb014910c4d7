//! Model invocation: one chat completion per invoice.
//!
//! The pipeline never talks to `edgequake-llm` directly. It goes through
//! [`ChatModel`], a one-method seam that [`ProviderModel`] implements for any
//! real provider and that tests implement with scripted replies.
//!
//! ## No retries
//!
//! A completion is requested exactly once. A provider error or an empty
//! reply becomes [`InvoiceError::ModelInvocationFailure`] and the request
//! fails; the caller decides whether to try again. No timeout is applied
//! here either, the transport's own is the only one.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Everything a backend needs to produce one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// A single free-text completion plus token accounting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// The model-invocation boundary.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request one completion for `request`.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, InvoiceError>;
}

/// [`ChatModel`] backed by an `edgequake-llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChatModel for ProviderModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, InvoiceError> {
        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user(request.user_prompt.as_str()),
        ];
        let options = build_options(request);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| InvoiceError::ModelInvocationFailure {
                message: e.to_string(),
            })?;

        Ok(ModelReply {
            content: response.content,
            prompt_tokens: response.prompt_tokens as usize,
            completion_tokens: response.completion_tokens as usize,
        })
    }
}

/// Build the request for one prompt from the extraction config.
pub fn build_request(prompt: String, config: &ExtractionConfig) -> ModelRequest {
    ModelRequest {
        system_prompt: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        user_prompt: prompt,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Send one request and insist on a non-empty completion.
pub async fn invoke(
    model: &dyn ChatModel,
    request: &ModelRequest,
) -> Result<ModelReply, InvoiceError> {
    let start = Instant::now();
    let reply = model.complete(request).await?;

    debug!(
        "Model reply: {} prompt tokens, {} completion tokens, {:?}",
        reply.prompt_tokens,
        reply.completion_tokens,
        start.elapsed()
    );

    if reply.content.trim().is_empty() {
        return Err(InvoiceError::ModelInvocationFailure {
            message: "model returned an empty completion".to_string(),
        });
    }

    Ok(reply)
}

/// Build `CompletionOptions` from a request.
fn build_options(request: &ModelRequest) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl ChatModel for Fixed {
        async fn complete(&self, _request: &ModelRequest) -> Result<ModelReply, InvoiceError> {
            Ok(ModelReply {
                content: self.0.to_string(),
                prompt_tokens: 10,
                completion_tokens: 2,
            })
        }
    }

    #[test]
    fn build_options_defaults() {
        let request = build_request("p".into(), &ExtractionConfig::default());
        let opts = build_options(&request);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(2000));
    }

    #[test]
    fn request_uses_default_system_prompt() {
        let request = build_request("prompt".into(), &ExtractionConfig::default());
        assert_eq!(request.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(request.user_prompt, "prompt");
    }

    #[test]
    fn request_honours_system_prompt_override() {
        let config = ExtractionConfig::builder()
            .system_prompt("Eres un contador.")
            .build()
            .unwrap();
        let request = build_request("prompt".into(), &config);
        assert_eq!(request.system_prompt, "Eres un contador.");
    }

    #[test]
    fn invoke_returns_content() {
        let request = build_request("p".into(), &ExtractionConfig::default());
        let reply = tokio_test::block_on(invoke(&Fixed("{}"), &request)).unwrap();
        assert_eq!(reply.content, "{}");
        assert_eq!(reply.completion_tokens, 2);
    }

    #[test]
    fn invoke_rejects_blank_completion() {
        let request = build_request("p".into(), &ExtractionConfig::default());
        let err = tokio_test::block_on(invoke(&Fixed("  \n"), &request)).unwrap_err();
        assert!(matches!(err, InvoiceError::ModelInvocationFailure { .. }));
    }
}
