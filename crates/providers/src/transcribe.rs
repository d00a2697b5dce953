//! Whisper-compatible speech-to-text.

use {
    anyhow::{Context, Result},
    reqwest::multipart::{Form, Part},
    serde::Deserialize,
    tracing::debug,
};

use crate::openai_compat::OpenAiClient;

/// Transcribes audio through `/audio/transcriptions`.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    client: OpenAiClient,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub async fn transcribe(&self, audio: Vec<u8>, filename: &str, mime: &str) -> Result<String> {
        let bytes = audio.len();
        let mime = mime.split(';').next().unwrap_or(mime).trim();
        let mut part = Part::bytes(audio).file_name(filename.to_string());
        if !mime.is_empty() {
            part = part.mime_str(mime).context("failed to create file part")?;
        }
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json");

        let resp: TranscriptionResponse = self
            .client
            .post_form("audio/transcriptions", form)
            .await?;
        debug!(bytes, chars = resp.text.chars().count(), "audio transcribed");
        Ok(resp.text.trim().to_string())
    }
}
