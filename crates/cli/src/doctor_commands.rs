//! `murmur doctor`: config validation and credential audit.
//!
//! Prints a report with `[ok]`, `[warn]`, `[fail]` or `[info]` per item and
//! exits non-zero when any check fails.

use std::path::Path;

use {
    anyhow::Result,
    murmur_config::{MurmurConfig, Severity},
    secrecy::ExposeSecret,
};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Info => CYAN,
        }
    }
}

struct CheckItem {
    status: Status,
    message: String,
}

struct Section {
    title: String,
    items: Vec<CheckItem>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push(CheckItem {
            status,
            message: message.into(),
        });
    }
}

// ── Printing ────────────────────────────────────────────────────────────────

fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for item in &section.items {
            let color = item.status.color();
            let label = item.status.label();
            eprintln!("  [{color}{label}{RESET}]  {}", item.message);
            match item.status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                _ => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub fn handle_doctor(explicit: Option<&Path>, config: &MurmurConfig) -> Result<()> {
    eprintln!("{BOLD}murmur doctor{RESET}");
    eprintln!("{BOLD}============={RESET}\n");

    let sections = vec![
        check_config(explicit, config),
        check_outbound(config),
        check_llm(config),
        check_coalescing(config),
    ];

    let (errors, warnings) = print_report(&sections);
    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

// ── Checks ──────────────────────────────────────────────────────────────────

fn check_config(explicit: Option<&Path>, config: &MurmurConfig) -> Section {
    let label = match explicit {
        Some(path) => path.display().to_string(),
        None => murmur_config::config_dir()
            .map(|d| format!("./murmur.* or {}", d.display()))
            .unwrap_or_else(|| "./murmur.*".into()),
    };
    let mut section = Section::new(format!("Config ({label})"));

    let result = murmur_config::validate(config);
    if result.diagnostics.is_empty() {
        section.push(Status::Ok, "no issues found");
    }
    for d in &result.diagnostics {
        let status = match d.severity {
            Severity::Error => Status::Fail,
            Severity::Warning => Status::Warn,
        };
        section.push(status, format!("{}: {}", d.path, d.message));
    }
    section
}

fn check_outbound(config: &MurmurConfig) -> Section {
    let mut section = Section::new("Outbound gateway");
    match config.gateway.base_url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => section.push(Status::Ok, format!("send endpoint: {url}/api/send-message")),
        None => section.push(Status::Info, "no base_url; `murmur send` and replies disabled"),
    }
    if has_secret(config.gateway.api_key.as_ref()) {
        section.push(Status::Ok, "api_key set");
    }
    section.push(
        Status::Info,
        format!("dispatch timeout: {}s", config.gateway.timeout_secs),
    );
    section
}

fn check_llm(config: &MurmurConfig) -> Section {
    let llm = &config.llm;
    let mut section = Section::new(format!("LLM ({})", llm.base_url));
    if has_secret(llm.api_key.as_ref()) {
        section.push(Status::Ok, "api_key set");
    }
    section.push(Status::Info, format!("reply model: {}", llm.model));
    section.push(
        Status::Info,
        format!("transcription model: {}", llm.transcription_model),
    );
    section.push(Status::Info, format!("vision model: {}", llm.vision_model));
    if llm.system_prompt.is_none() {
        section.push(Status::Info, "using built-in system prompt");
    }
    section
}

fn check_coalescing(config: &MurmurConfig) -> Section {
    let auto = &config.auto_reply;
    let mut section = Section::new("Coalescing");
    let cap = match auto.max_wait_ms {
        Some(ms) => format!("capped at {ms}ms"),
        None => "uncapped".into(),
    };
    section.push(
        Status::Info,
        format!("debounce window: {}ms ({cap})", auto.debounce_ms),
    );
    section.push(
        Status::Info,
        format!(
            "senders: {} + {} digits",
            config.whatsapp.country_prefix, config.whatsapp.subscriber_digits
        ),
    );
    section
}

fn has_secret(secret: Option<&secrecy::Secret<String>>) -> bool {
    secret.is_some_and(|s| !s.expose_secret().trim().is_empty())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    fn statuses(section: &Section) -> Vec<Status> {
        section.items.iter().map(|i| i.status).collect()
    }

    #[test]
    fn print_report_counts_errors_and_warnings() {
        let mut section = Section::new("test");
        section.push(Status::Ok, "fine");
        section.push(Status::Warn, "caution");
        section.push(Status::Warn, "caution2");
        section.push(Status::Fail, "broken");
        section.push(Status::Info, "note");

        let (errors, warnings) = print_report(&[section]);
        assert_eq!(errors, 1);
        assert_eq!(warnings, 2);
    }

    #[test]
    fn default_config_only_warns() {
        let section = check_config(None, &MurmurConfig::default());
        assert!(!statuses(&section).contains(&Status::Fail));
        assert_eq!(
            statuses(&section)
                .iter()
                .filter(|s| **s == Status::Warn)
                .count(),
            3
        );
    }

    #[test]
    fn zero_debounce_fails() {
        let mut config = MurmurConfig::default();
        config.auto_reply.debounce_ms = 0;
        let section = check_config(Some(Path::new("murmur.toml")), &config);
        assert_eq!(section.title, "Config (murmur.toml)");
        assert!(statuses(&section).contains(&Status::Fail));
    }

    #[test]
    fn configured_gateway_is_ok() {
        let mut config = MurmurConfig::default();
        config.gateway.base_url = Some("https://gw.example".into());
        config.gateway.api_key = Some(Secret::new("wk".into()));
        let section = check_outbound(&config);
        assert_eq!(statuses(&section), vec![Status::Ok, Status::Ok, Status::Info]);
        assert!(section.items[0].message.ends_with("/api/send-message"));
    }
}
