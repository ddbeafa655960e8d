//! Configuration validation.
//!
//! Checks a loaded [`JoingateConfig`] for values that would make the bot
//! unusable or behave surprisingly, and reports them as diagnostics instead of
//! failing hard.

use joingate_common::types::{MAX_REQUIRED_CHANNELS, parse_channel_list};

use crate::schema::JoingateConfig;

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
    /// Dotted path, e.g. "telegram.token"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &JoingateConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    let token = config
        .telegram
        .get("token")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    if token.trim().is_empty() {
        result.push(
            Severity::Error,
            "telegram.token",
            "bot token is missing (set BOT_TOKEN)",
        );
    }

    if config.owner_id == 0 {
        result.push(
            Severity::Warning,
            "owner_id",
            "owner id is 0; owner-only commands are unreachable (set OWNER_ID)",
        );
    }

    match parse_channel_list(config.required_channels.iter().map(String::as_str)) {
        Ok(parsed) if parsed.truncated() => result.push(
            Severity::Warning,
            "required_channels",
            format!(
                "maximum {MAX_REQUIRED_CHANNELS} required channels allowed, ignoring: {}",
                parsed.dropped.join(" ")
            ),
        ),
        Ok(_) => {},
        Err(e) => result.push(Severity::Error, "required_channels", e.to_string()),
    }

    if config.gate.verify_timeout_secs == 0 {
        result.push(
            Severity::Error,
            "gate.verify_timeout_secs",
            "must be greater than zero",
        );
    }

    if config.broadcast.delay_ms == 0 {
        result.push(
            Severity::Warning,
            "broadcast.delay_ms",
            "no delay between broadcast deliveries; the platform may rate limit the bot",
        );
    }

    result
}
