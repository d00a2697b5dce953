/// Config schema types (server, whatsapp, gateway, auto-reply, media, llm).
use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MurmurConfig {
    pub server: ServerConfig,
    pub whatsapp: WhatsAppConfig,
    pub gateway: GatewayConfig,
    pub auto_reply: AutoReplyConfig,
    pub media: MediaConfig,
    pub llm: LlmConfig,
}

/// Webhook server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0" so the provider can reach us.
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3001,
        }
    }
}

/// Sender numbering and media host settings for the target market.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Country calling code prepended to domestic numbers (digits only).
    pub country_prefix: String,
    /// Number of digits after the country prefix in a valid identifier.
    pub subscriber_digits: usize,
    /// Host that relative media paths (`directPath`) are resolved against.
    pub media_host: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            country_prefix: "972".into(),
            subscriber_digits: 9,
            media_host: "https://mmg.whatsapp.net".into(),
        }
    }
}

/// Outbound messaging gateway (Wasender-compatible send endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL, e.g. "https://www.wasenderapi.com". `/api/send-message` is appended.
    pub base_url: Option<String>,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: 15,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Inbound coalescing behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoReplyConfig {
    /// Quiet period after the last fragment before a batch is flushed.
    pub debounce_ms: u64,
    /// Upper bound on how long a batch may keep sliding, measured from its
    /// first fragment. `None` keeps the window unbounded.
    pub max_wait_ms: Option<u64>,
    /// Joins coalesced fragments into one request.
    pub separator: String,
    /// Bound on a single reply generation call.
    pub reply_timeout_secs: u64,
    /// Substituted for an attachment that could not be downloaded.
    pub media_unavailable_text: String,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 5_000,
            max_wait_ms: None,
            separator: "\n".into(),
            reply_timeout_secs: 60,
            media_unavailable_text: "[The user sent an attachment that could not be retrieved. \
                                     Apologise briefly and ask them to describe it in text.]"
                .into(),
        }
    }
}

impl AutoReplyConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

/// Media download and preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub fetch_timeout_secs: u64,
    /// Downloads larger than this are abandoned.
    pub max_bytes: u64,
    /// Bound on one transcription or image description call.
    pub interpret_timeout_secs: u64,
    /// Images larger than this (either side) are downscaled before description.
    pub max_image_dimension: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            max_bytes: 25 * 1024 * 1024,
            interpret_timeout_secs: 60,
            max_image_dimension: 1568,
        }
    }
}

impl MediaConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn interpret_timeout(&self) -> Duration {
        Duration::from_secs(self.interpret_timeout_secs)
    }
}

/// OpenAI-compatible endpoint used for replies, transcription and image description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub transcription_model: String,
    pub vision_model: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            model: "gpt-3.5-turbo".into(),
            transcription_model: "whisper-1".into(),
            vision_model: "gpt-4o".into(),
            system_prompt: None,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
