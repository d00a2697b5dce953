use {async_trait::async_trait, murmur_common::MediaKind};

use crate::Result;

/// Decrypted attachment handed to an interpreter.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub kind: MediaKind,
    pub mime: String,
    /// Suggested upload filename, extension included.
    pub filename: String,
    pub data: Vec<u8>,
}

/// Turns an attachment into text the reply generator can read
/// (transcripts for audio, descriptions for images).
#[async_trait]
pub trait MediaInterpreter: Send + Sync {
    async fn interpret(&self, media: &MediaPayload) -> Result<String>;

    /// Whether `kind` is worth downloading for this interpreter.
    fn supports(&self, _kind: MediaKind) -> bool {
        true
    }
}

/// Prefix marking converted media in the coalesced text.
pub fn tag(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "[voice message]",
        MediaKind::Image => "[image]",
        MediaKind::Video => "[video]",
        MediaKind::Document => "[document]",
    }
}

/// `text` prefixed with the tag for `kind`.
pub fn tagged(kind: MediaKind, text: &str) -> String {
    format!("{} {}", tag(kind), text.trim())
}
