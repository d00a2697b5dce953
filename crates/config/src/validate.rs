//! Semantic checks on a loaded configuration.

use secrecy::ExposeSecret;

use crate::schema::MurmurConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "auto_reply.debounce_ms".
    pub path: &'static str,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path,
            message: message.into(),
        }
    }

    fn warning(path: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path,
            message: message.into(),
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Check a configuration for values that would make the relay misbehave.
///
/// Missing credentials are warnings: the server still starts and answers
/// webhooks, it just cannot reply.
#[must_use]
pub fn validate(config: &MurmurConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let prefix = &config.whatsapp.country_prefix;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        diagnostics.push(Diagnostic::error(
            "whatsapp.country_prefix",
            format!("must be a non-empty digit string, got {prefix:?}"),
        ));
    }
    if config.whatsapp.subscriber_digits == 0 {
        diagnostics.push(Diagnostic::error(
            "whatsapp.subscriber_digits",
            "must be greater than zero",
        ));
    }
    if !config.whatsapp.media_host.starts_with("http") {
        diagnostics.push(Diagnostic::error(
            "whatsapp.media_host",
            "must be an http(s) URL",
        ));
    }

    if config.media.max_bytes == 0 {
        diagnostics.push(Diagnostic::error(
            "media.max_bytes",
            "must be greater than zero",
        ));
    }

    if config.auto_reply.debounce_ms == 0 {
        diagnostics.push(Diagnostic::error(
            "auto_reply.debounce_ms",
            "must be greater than zero",
        ));
    }
    if let Some(max_wait) = config.auto_reply.max_wait_ms
        && max_wait < config.auto_reply.debounce_ms
    {
        diagnostics.push(Diagnostic::warning(
            "auto_reply.max_wait_ms",
            "is shorter than debounce_ms; every batch will flush at max_wait",
        ));
    }

    if config.gateway.base_url.as_deref().is_none_or(str::is_empty) {
        diagnostics.push(Diagnostic::warning(
            "gateway.base_url",
            "not set; replies cannot be sent (set WASENDER_BASE_URL)",
        ));
    }
    if blank_secret(config.gateway.api_key.as_ref()) {
        diagnostics.push(Diagnostic::warning(
            "gateway.api_key",
            "not set; replies cannot be sent (set WASENDER_API_KEY)",
        ));
    }
    if blank_secret(config.llm.api_key.as_ref()) {
        diagnostics.push(Diagnostic::warning(
            "llm.api_key",
            "not set; reply generation will fail (set OPENAI_API_KEY)",
        ));
    }

    ValidationResult { diagnostics }
}

fn blank_secret(secret: Option<&secrecy::Secret<String>>) -> bool {
    secret.is_none_or(|s| s.expose_secret().trim().is_empty())
}
