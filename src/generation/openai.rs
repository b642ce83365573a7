//! OpenAI chat-completion generator.

use super::{GenerationPrompt, Generator};
use crate::config::GenerationSettings;
use crate::error::{Result, SvarError};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Generator backed by the OpenAI chat completions API.
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    /// Create a generator from the `[generation]` settings section.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        Self::with_config(
            &settings.model,
            settings.temperature,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn with_config(model: &str, temperature: f32, timeout: Duration) -> Result<Self> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(SvarError::Config(format!(
                "temperature must be between 0 and 2, got {}",
                temperature
            )));
        }

        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            model: model.to_string(),
            temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system.clone())
                .build()
                .map_err(|e| SvarError::InvalidInput(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.clone())
                .build()
                .map_err(|e| SvarError::InvalidInput(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| SvarError::InvalidInput(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            SvarError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SvarError::OpenAI("Empty response from LLM".to_string()))?
            .clone();

        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_creation() {
        let generator = OpenAIGenerator::from_settings(&GenerationSettings::default()).unwrap();
        assert_eq!(generator.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_temperature_out_of_range() {
        let result = OpenAIGenerator::with_config("gpt-4o-mini", 3.5, Duration::from_secs(1));
        assert!(matches!(result, Err(SvarError::Config(_))));
    }
}
