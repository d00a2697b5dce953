use {
    async_trait::async_trait,
    murmur_common::MediaKind,
    murmur_config::{LlmConfig, MediaConfig},
    murmur_media::{Error, MediaInterpreter, MediaPayload, Result},
};

use crate::{openai_compat::OpenAiClient, transcribe::WhisperTranscriber, vision::ImageDescriber};

/// Audio via Whisper, images via a vision model. Other kinds are unsupported.
#[derive(Debug, Clone)]
pub struct OpenAiMediaInterpreter {
    transcriber: WhisperTranscriber,
    describer: ImageDescriber,
}

impl OpenAiMediaInterpreter {
    pub fn new(transcriber: WhisperTranscriber, describer: ImageDescriber) -> Self {
        Self {
            transcriber,
            describer,
        }
    }

    pub fn from_config(client: OpenAiClient, llm: &LlmConfig, media: &MediaConfig) -> Self {
        Self::new(
            WhisperTranscriber::new(client.clone(), llm.transcription_model.clone()),
            ImageDescriber::new(client, llm.vision_model.clone(), media.max_image_dimension),
        )
    }
}

fn provider_error(context: &str, e: anyhow::Error) -> Error {
    Error::External {
        context: context.to_string(),
        source: e.into(),
    }
}

#[async_trait]
impl MediaInterpreter for OpenAiMediaInterpreter {
    async fn interpret(&self, media: &MediaPayload) -> Result<String> {
        match media.kind {
            MediaKind::Audio => self
                .transcriber
                .transcribe(media.data.clone(), &media.filename, &media.mime)
                .await
                .map_err(|e| provider_error("transcription failed", e)),
            MediaKind::Image => self
                .describer
                .describe(&media.data, &media.mime)
                .await
                .map_err(|e| provider_error("image description failed", e)),
            MediaKind::Video | MediaKind::Document => Err(Error::unsupported(format!(
                "no interpreter for {} attachments",
                media.kind
            ))),
        }
    }

    fn supports(&self, kind: MediaKind) -> bool {
        matches!(kind, MediaKind::Audio | MediaKind::Image)
    }
}
