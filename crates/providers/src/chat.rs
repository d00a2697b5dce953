use {
    async_trait::async_trait, murmur_auto_reply::ReplyGenerator, murmur_common::SenderId,
    murmur_config::LlmConfig, tracing::debug,
};

use crate::openai_compat::{ChatMessage, ChatRequest, OpenAiClient};

/// Used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a smart, helpful assistant. Reply clearly and in \
                                         a friendly tone, in the language the user writes in.";

/// [`ReplyGenerator`] backed by `/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiReplyGenerator {
    client: OpenAiClient,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiReplyGenerator {
    pub fn new(client: OpenAiClient, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            system_prompt: config
                .system_prompt
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.into()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiReplyGenerator {
    async fn generate(&self, sender: &SenderId, text: &str) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(text),
            ],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };
        let reply = self.client.chat(&request).await?;
        debug!(sender = %sender, chars = reply.chars().count(), "reply generated");
        Ok(reply)
    }
}
