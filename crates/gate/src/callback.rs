//! Inline button payloads produced and consumed by the bot.

use std::{fmt, str::FromStr};

use joingate_common::types::GroupId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// "I've joined" under a group join prompt.
    Confirm(GroupId),
    /// On/off buttons under the `/fsub` status message.
    SetEnabled { group: GroupId, enabled: bool },
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirm(group) => write!(f, "confirm:{group}"),
            Self::SetEnabled { group, enabled } => {
                let state = if *enabled { "on" } else { "off" };
                write!(f, "fsub:{state}:{group}")
            },
        }
    }
}

impl FromStr for CallbackAction {
    type Err = ();

    fn from_str(data: &str) -> Result<Self, ()> {
        let mut parts = data.split(':');
        let action = match (parts.next(), parts.next(), parts.next()) {
            (Some("confirm"), Some(group), None) => Self::Confirm(group.parse().map_err(|_| ())?),
            (Some("fsub"), Some(state), Some(group)) => Self::SetEnabled {
                group: group.parse().map_err(|_| ())?,
                enabled: match state {
                    "on" => true,
                    "off" => false,
                    _ => return Err(()),
                },
            },
            _ => return Err(()),
        };
        if parts.next().is_some() {
            return Err(());
        }
        Ok(action)
    }
}
