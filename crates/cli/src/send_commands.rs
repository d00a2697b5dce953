//! `murmur send`: deliver one message outside the auto-reply flow.

use {
    anyhow::{Context, Result},
    murmur_channels::ChannelOutbound,
    murmur_config::MurmurConfig,
    murmur_whatsapp::{SenderNormalizer, WasenderOutbound},
    tracing::info,
};

pub async fn handle_send(config: &MurmurConfig, to: &str, message: &str) -> Result<()> {
    let normalizer = SenderNormalizer::from_config(&config.whatsapp)?;
    let recipient = normalizer
        .canonicalize(to)
        .context("recipient is not a valid phone number")?;
    if message.trim().is_empty() {
        anyhow::bail!("message must not be empty");
    }

    let outbound = WasenderOutbound::from_config(reqwest::Client::new(), &config.gateway)?;
    outbound.send_text(&recipient, message).await?;

    info!(to = %recipient, "message sent");
    eprintln!("sent to {recipient}");
    Ok(())
}
