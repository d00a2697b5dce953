use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    tracing::debug,
};

use {
    murmur_channels::{ChannelOutbound, Error, Result},
    murmur_common::SenderId,
    murmur_config::GatewayConfig,
};

/// Outbound sender for the Wasender HTTP gateway.
#[derive(Clone)]
pub struct WasenderOutbound {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    timeout: Duration,
}

impl std::fmt::Debug for WasenderOutbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasenderOutbound")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    to: &'a str,
    text: &'a str,
}

impl WasenderOutbound {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Secret<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    /// Build from config; fails when the base URL or API key is missing.
    pub fn from_config(http: reqwest::Client, config: &GatewayConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::unavailable("gateway base_url is not configured"))?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or_else(|| Error::unavailable("gateway api_key is not configured"))?;
        Ok(Self::new(http, base_url, api_key, config.timeout()))
    }

    fn endpoint(&self) -> String {
        format!("{}/api/send-message", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChannelOutbound for WasenderOutbound {
    async fn send_text(&self, to: &SenderId, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input("refusing to send an empty message"));
        }

        let key = self.api_key.expose_secret();
        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(key)
            .header("X-API-KEY", key)
            .timeout(self.timeout)
            .json(&SendMessage {
                to: to.as_str(),
                text,
            })
            .send()
            .await
            .map_err(|e| Error::external("wasender request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::rejected(status.as_u16(), body));
        }

        debug!(to = %to, chars = text.chars().count(), "message dispatched");
        Ok(())
    }
}
