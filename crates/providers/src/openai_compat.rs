//! Shared HTTP plumbing and wire types for OpenAI-compatible endpoints.

use {
    anyhow::{Context, Result, anyhow},
    reqwest::multipart::Form,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

/// Authenticated client for one OpenAI-compatible base URL.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<Secret<String>>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(http: reqwest::Client, config: &murmur_config::LlmConfig) -> Self {
        Self::new(http, config.base_url.clone(), config.api_key.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("OpenAI API key not configured"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a chat completion and return the first choice's text.
    pub async fn chat(&self, request: &ChatRequest<'_>) -> Result<String> {
        let api_key = self.api_key()?;
        debug!(
            model = request.model,
            messages_count = request.messages.len(),
            "chat completion request"
        );

        let resp = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .context("failed to send chat completion request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, model = request.model, "chat completion API error");
            anyhow::bail!("OpenAI API error HTTP {status}: {body}");
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("failed to parse chat completion response")?;
        Ok(parsed.first_text())
    }

    /// POST a multipart form and parse the JSON response.
    pub async fn post_form<T: for<'de> Deserialize<'de>>(&self, path: &str, form: Form) -> Result<T> {
        let api_key = self.api_key()?;
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("failed to send {path} request"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error HTTP {status}: {body}");
        }
        resp.json()
            .await
            .with_context(|| format!("failed to parse {path} response"))
    }
}

// ── Chat completion types ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn first_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default()
    }
}
