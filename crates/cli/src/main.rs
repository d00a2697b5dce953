mod doctor_commands;
mod send_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    murmur_config::MurmurConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "murmur", about = "Murmur: WhatsApp auto-reply relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value and PORT).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Config file (defaults to murmur.{toml,yaml,json} in ./ or ~/.config/murmur/).
    #[arg(long, global = true, env = "MURMUR_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server (default when no subcommand is provided).
    Gateway,
    /// Send one message through the outbound gateway.
    Send {
        /// Recipient phone number, any common local or international form.
        #[arg(long)]
        to: String,
        #[arg(short, long)]
        message: String,
    },
    /// Validate configuration and report missing credentials.
    Doctor,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<MurmurConfig> {
    let mut config = murmur_config::discover_and_load(cli.config.as_deref())?;
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "murmur starting");

    let config = load_config(&cli)?;
    match cli.command {
        None | Some(Commands::Gateway) => murmur_gateway::start_gateway(config).await,
        Some(Commands::Send { to, message }) => {
            send_commands::handle_send(&config, &to, &message).await
        },
        Some(Commands::Doctor) => doctor_commands::handle_doctor(cli.config.as_deref(), &config),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_gateway() {
        let cli = Cli::try_parse_from(["murmur", "--port", "8080"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn send_requires_recipient_and_message() {
        assert!(Cli::try_parse_from(["murmur", "send", "--message", "hi"]).is_err());
        let cli =
            Cli::try_parse_from(["murmur", "send", "--to", "0501234567", "-m", "hi"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Send { ref to, .. }) if to == "0501234567"));
    }

    #[test]
    fn flags_are_global() {
        let cli = Cli::try_parse_from(["murmur", "doctor", "--json-logs", "--log-level", "debug"])
            .unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.log_level, "debug");
    }
}
