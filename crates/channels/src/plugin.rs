use {async_trait::async_trait, murmur_common::SenderId};

use crate::Result;

/// Send messages to a channel.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Deliver one text message to `to`. Callers pass canonical identifiers
    /// only; implementations do not re-normalize.
    async fn send_text(&self, to: &SenderId, text: &str) -> Result<()>;
}
