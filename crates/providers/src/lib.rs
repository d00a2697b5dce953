//! OpenAI-compatible providers: reply generation, Whisper transcription and
//! image description.

pub mod chat;
pub mod interpreter;
pub mod openai_compat;
pub mod transcribe;
pub mod vision;

pub use {
    chat::OpenAiReplyGenerator,
    interpreter::OpenAiMediaInterpreter,
    openai_compat::OpenAiClient,
    transcribe::WhisperTranscriber,
    vision::ImageDescriber,
};
