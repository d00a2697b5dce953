use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::schema::MurmurConfig;

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["murmur.toml", "murmur.yaml", "murmur.yml", "murmur.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<MurmurConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&raw, path)
}

/// Load config from `explicit` or the standard locations, then apply
/// environment overrides.
///
/// Search order when no path is given:
/// 1. `./murmur.{toml,yaml,yml,json}`
/// 2. `~/.config/murmur/murmur.{toml,yaml,yml,json}`
///
/// An explicit path that fails to load is an error; a discovered file that
/// fails to load falls back to defaults with a warning.
pub fn discover_and_load(explicit: Option<&Path>) -> anyhow::Result<MurmurConfig> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None => match find_config_file() {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                load_config(&path).unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                    MurmurConfig::default()
                })
            },
            None => {
                debug!("no config file found, using defaults");
                MurmurConfig::default()
            },
        },
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Overlay well-known environment variables onto `config`.
pub fn apply_env_overrides(config: &mut MurmurConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

/// Same as [`apply_env_overrides`] with a custom lookup so tests don't have
/// to mutate the process environment.
fn apply_env_overrides_with(config: &mut MurmurConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(port) = lookup("PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %port, error = %e, "ignoring invalid PORT"),
        }
    }
    if let Some(url) = lookup("WASENDER_BASE_URL") {
        config.gateway.base_url = Some(url);
    }
    if let Some(key) = lookup("WASENDER_API_KEY") {
        config.gateway.api_key = Some(Secret::new(key));
    }
    if let Some(key) = lookup("OPENAI_API_KEY") {
        config.llm.api_key = Some(Secret::new(key));
    }
    if let Some(model) = lookup("OPENAI_MODEL") {
        config.llm.model = model;
    }
    if let Some(ms) = lookup("MURMUR_DEBOUNCE_MS") {
        match ms.parse() {
            Ok(ms) => config.auto_reply.debounce_ms = ms,
            Err(e) => warn!(value = %ms, error = %e, "ignoring invalid MURMUR_DEBOUNCE_MS"),
        }
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/murmur/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "murmur").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<MurmurConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
