//! Configuration loading, environment overrides and validation.
//!
//! Config files: `murmur.toml`, `murmur.yaml`, or `murmur.json`,
//! searched in `./` then `~/.config/murmur/`.

pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{
        AutoReplyConfig, GatewayConfig, LlmConfig, MediaConfig, MurmurConfig, ServerConfig,
        WhatsAppConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
