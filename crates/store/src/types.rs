use {
    joingate_common::types::{ChannelRequirement, MAX_REQUIRED_CHANNELS},
    serde::{Deserialize, Serialize},
    tracing::warn,
};

/// Per-group required channels and the on/off switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    pub channels: Vec<ChannelRequirement>,
    /// Missing in legacy records; read as enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SubscriptionConfig {
    /// Build a config, dropping channels past the per-scope cap.
    pub fn new(mut channels: Vec<ChannelRequirement>, enabled: bool) -> Self {
        if channels.len() > MAX_REQUIRED_CHANNELS {
            warn!(
                count = channels.len(),
                max = MAX_REQUIRED_CHANNELS,
                "truncating required channel list"
            );
            channels.truncate(MAX_REQUIRED_CHANNELS);
        }
        Self { channels, enabled }
    }

    /// Whether this config restricts anyone. A disabled or empty config is
    /// equivalent to no config at all.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.channels.is_empty()
    }
}
