use std::sync::Arc;

use {
    async_trait::async_trait,
    murmur_auto_reply::{CoalesceConfig, CoalescingBuffer, ReplyGenerator},
    murmur_channels::{ChannelOutbound, Error as ChannelError, Result as ChannelResult},
    murmur_common::SenderId,
    murmur_config::MurmurConfig,
    murmur_media::{MediaFetcher, MediaInterpreter, MediaPipeline},
    murmur_providers::{OpenAiClient, OpenAiMediaInterpreter, OpenAiReplyGenerator},
    murmur_whatsapp::{SenderNormalizer, WasenderOutbound},
    tracing::warn,
};

use crate::ingest::IngestLanes;

/// Shared state behind every request handler.
pub struct GatewayState {
    pub normalizer: SenderNormalizer,
    pub media: MediaPipeline,
    pub buffer: CoalescingBuffer,
    pub lanes: IngestLanes,
    pub version: &'static str,
}

impl GatewayState {
    pub fn new(normalizer: SenderNormalizer, media: MediaPipeline, buffer: CoalescingBuffer) -> Self {
        Self {
            normalizer,
            media,
            buffer,
            lanes: IngestLanes::default(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Wire the production collaborators from `config`.
    pub fn from_config(config: &MurmurConfig) -> anyhow::Result<Arc<Self>> {
        let http = reqwest::Client::new();
        let normalizer = SenderNormalizer::from_config(&config.whatsapp)?;

        let llm = OpenAiClient::from_config(http.clone(), &config.llm);
        if !llm.is_configured() {
            warn!("llm.api_key is not set; reply generation will fail");
        }
        let interpreter: Arc<dyn MediaInterpreter> = Arc::new(
            OpenAiMediaInterpreter::from_config(llm.clone(), &config.llm, &config.media),
        );
        let generator: Arc<dyn ReplyGenerator> =
            Arc::new(OpenAiReplyGenerator::new(llm, &config.llm));

        let dispatcher = dispatcher_from_config(http.clone(), config);
        let media = MediaPipeline::new(
            MediaFetcher::new(
                http,
                config.whatsapp.media_host.clone(),
                config.media.fetch_timeout(),
            )
            .with_max_bytes(config.media.max_bytes),
            interpreter,
            config.auto_reply.media_unavailable_text.clone(),
        )
        .with_interpret_timeout(config.media.interpret_timeout());
        let buffer = CoalescingBuffer::new(
            CoalesceConfig::from_config(&config.auto_reply, config.gateway.timeout()),
            generator,
            dispatcher,
        );
        Ok(Arc::new(Self::new(normalizer, media, buffer)))
    }
}

fn dispatcher_from_config(http: reqwest::Client, config: &MurmurConfig) -> Arc<dyn ChannelOutbound> {
    match WasenderOutbound::from_config(http, &config.gateway) {
        Ok(outbound) => Arc::new(outbound),
        Err(e) => {
            warn!(error = %e, "outbound gateway disabled; replies will be dropped");
            Arc::new(DisabledOutbound)
        },
    }
}

/// Stand-in dispatcher used when the outbound gateway is not configured.
/// Every send fails so the buffer logs and drops the batch.
struct DisabledOutbound;

#[async_trait]
impl ChannelOutbound for DisabledOutbound {
    async fn send_text(&self, _to: &SenderId, _text: &str) -> ChannelResult<()> {
        Err(ChannelError::unavailable("outbound gateway is not configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_outbound_reports_unavailable() {
        let err = DisabledOutbound
            .send_text(&SenderId::from_canonical("972501234567"), "hi")
            .await;
        assert!(matches!(err, Err(ChannelError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn builds_from_default_config() {
        let state = GatewayState::from_config(&MurmurConfig::default());
        assert!(state.is_ok());
    }
}
