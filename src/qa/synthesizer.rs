//! Answer generation from resolved context.

use crate::config::{CompletionSettings, Prompts};
use crate::error::{Result, SporError};
use crate::openai::create_client_with;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Answer returned when the model produces no usable text.
pub const NO_ANSWER_FALLBACK: &str = "Sorry, I couldn't generate an answer.";

/// Sampling parameters for a completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: 1024,
        }
    }
}

impl From<&CompletionSettings> for CompletionOptions {
    fn from(settings: &CompletionSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete a single-turn prompt. `None` means the service returned no content.
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<Option<String>>;
}

/// Chat-completion backend for OpenAI-compatible APIs.
pub struct OpenAICompletion {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAICompletion {
    /// Build a client from completion settings.
    pub fn from_settings(settings: &CompletionSettings) -> Result<Self> {
        let client = create_client_with(
            settings.api_base.as_deref(),
            &settings.api_key_env,
            settings.timeout(),
        )?;

        Ok(Self {
            client,
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionService for OpenAICompletion {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<Option<String>> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| SporError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(options.temperature)
            .max_completion_tokens(options.max_tokens)
            .build()
            .map_err(|e| SporError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SporError::OpenAI(format!("Failed to generate response: {}", e)))?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content))
    }
}

/// Turns context and a question into an answer.
pub struct AnswerSynthesizer {
    service: Arc<dyn CompletionService>,
    prompts: Prompts,
    options: CompletionOptions,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(service: Arc<dyn CompletionService>, prompts: Prompts) -> Self {
        Self {
            service,
            prompts,
            options: CompletionOptions::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Upper bound on one completion call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Render the answer prompt.
    pub fn build_prompt(&self, context: &str, question: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), context.to_string());
        vars.insert("question".to_string(), question.to_string());
        self.prompts.render_with_custom(&self.prompts.qa.answer, &vars)
    }

    /// Generate an answer. Service errors and timeouts become `SynthesisFailed`.
    #[instrument(skip(self, context), fields(context_len = context.len()))]
    pub async fn synthesize(&self, context: &str, question: &str) -> Result<String> {
        let prompt = self.build_prompt(context, question);

        let completion = tokio::time::timeout(self.timeout, self.service.complete(&prompt, &self.options))
            .await
            .map_err(|_| {
                SporError::SynthesisFailed(format!("completion timed out after {:?}", self.timeout))
            })?
            .map_err(|e| SporError::SynthesisFailed(e.to_string()))?;

        match completion.filter(|answer| !answer.trim().is_empty()) {
            Some(answer) => {
                debug!(answer_len = answer.len(), "Generated answer");
                Ok(answer)
            }
            None => {
                warn!("Completion service returned no content");
                Ok(NO_ANSWER_FALLBACK.to_string())
            }
        }
    }
}
