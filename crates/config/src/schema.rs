/// Config schema types (owner, required channels, storage, gate, broadcast).
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoingateConfig {
    /// Platform user id of the bot owner. Bypasses the global scope and may
    /// run owner-only commands.
    pub owner_id: i64,
    /// Chat that receives "new user" / "new group" notices.
    pub log_chat_id: Option<i64>,
    /// Global required channels (ids or handles). Only the first four are used.
    pub required_channels: Vec<String>,
    /// sqlx connection string for the subscription registry.
    pub database_url: String,
    /// Telegram account config, deserialized by the telegram crate.
    pub telegram: serde_json::Value,
    pub gate: GateConfig,
    pub broadcast: BroadcastConfig,
}

impl Default for JoingateConfig {
    fn default() -> Self {
        Self {
            owner_id: 0,
            log_chat_id: None,
            required_channels: Vec::new(),
            database_url: "sqlite://joingate.db?mode=rwc".into(),
            telegram: serde_json::Value::Object(serde_json::Map::new()),
            gate: GateConfig::default(),
            broadcast: BroadcastConfig::default(),
        }
    }
}

/// Which events the global scope applies to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GlobalScopeMode {
    /// Every message event.
    #[default]
    All,
    /// Only messages that carry a bot command.
    Commands,
}

/// How the global scope treats a channel whose membership could not be
/// determined.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndeterminateMode {
    /// Log and move on; the channel is not reported as missing.
    #[default]
    Skip,
    /// Report the channel as missing (fail closed).
    Deny,
}

/// Enforcement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Upper bound for a single membership check.
    pub verify_timeout_secs: u64,
    pub global_scope: GlobalScopeMode,
    pub global_indeterminate: IndeterminateMode,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            verify_timeout_secs: 10,
            global_scope: GlobalScopeMode::default(),
            global_indeterminate: IndeterminateMode::default(),
        }
    }
}

/// Broadcast engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Minimum delay between two consecutive delivery attempts.
    pub delay_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { delay_ms: 100 }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = JoingateConfig::default();
        assert_eq!(cfg.owner_id, 0);
        assert!(cfg.required_channels.is_empty());
        assert_eq!(cfg.gate.verify_timeout_secs, 10);
        assert_eq!(cfg.gate.global_scope, GlobalScopeMode::All);
        assert_eq!(cfg.gate.global_indeterminate, IndeterminateMode::Skip);
        assert_eq!(cfg.broadcast.delay_ms, 100);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: JoingateConfig = toml::from_str(
            r#"
            owner_id = 77
            required_channels = ["@news", "-1001"]

            [gate]
            global_scope = "commands"

            [telegram]
            token = "123:abc"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.owner_id, 77);
        assert_eq!(cfg.required_channels, vec!["@news", "-1001"]);
        assert_eq!(cfg.gate.global_scope, GlobalScopeMode::Commands);
        assert_eq!(cfg.gate.verify_timeout_secs, 10);
        assert_eq!(cfg.telegram["token"], "123:abc");
        assert_eq!(cfg.broadcast.delay_ms, 100);
    }
}
