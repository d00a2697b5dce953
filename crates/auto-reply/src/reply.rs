use {async_trait::async_trait, murmur_common::SenderId};

/// Produces the reply text for one coalesced request.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// `text` is the joined batch; an empty return means "send nothing".
    async fn generate(&self, sender: &SenderId, text: &str) -> anyhow::Result<String>;
}
