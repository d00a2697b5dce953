//! Sender identifier canonicalization.

use {murmur_common::SenderId, regex::Regex};

use crate::error::{Error, Result};

/// Canonicalizes raw phone identifiers for one numbering market.
#[derive(Debug, Clone)]
pub struct SenderNormalizer {
    prefix: String,
    pattern: Regex,
}

impl SenderNormalizer {
    /// `prefix` is the country calling code (digits only); a canonical
    /// identifier is `prefix` followed by exactly `subscriber_digits` digits.
    pub fn new(prefix: impl Into<String>, subscriber_digits: usize) -> Result<Self> {
        let prefix = prefix.into();
        let pattern = Regex::new(&format!(
            "^{}[0-9]{{{subscriber_digits}}}$",
            regex::escape(&prefix)
        ))?;
        Ok(Self { prefix, pattern })
    }

    pub fn from_config(config: &murmur_config::WhatsAppConfig) -> Result<Self> {
        Self::new(config.country_prefix.clone(), config.subscriber_digits)
    }

    /// Rewrite `raw` into canonical digit form. Never fails; the output may
    /// still be invalid and must go through [`Self::is_valid`].
    pub fn normalize(&self, raw: &str) -> String {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let digits = digits.strip_prefix("00").unwrap_or(&digits);

        if digits.starts_with(&self.prefix) {
            return digits.to_string();
        }
        match digits.strip_prefix('0') {
            Some(rest) => format!("{}{rest}", self.prefix),
            None => format!("{}{digits}", self.prefix),
        }
    }

    pub fn is_valid(&self, candidate: &str) -> bool {
        self.pattern.is_match(candidate)
    }

    /// Normalize and validate in one step.
    pub fn canonicalize(&self, raw: &str) -> Result<SenderId> {
        let normalized = self.normalize(raw);
        if !self.is_valid(&normalized) {
            return Err(Error::InvalidSender {
                raw: raw.to_string(),
                normalized,
            });
        }
        Ok(SenderId::from_canonical(normalized))
    }
}
