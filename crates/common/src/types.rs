use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Platform user identifier.
pub type UserId = i64;

/// Platform group/conversation identifier (negative by Telegram convention).
pub type GroupId = i64;

/// Maximum number of required channels per scope. Extra entries are dropped.
pub const MAX_REQUIRED_CHANNELS: usize = 4;

/// Kind of conversation an event originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Channel,
}

impl ChatType {
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group)
    }
}

/// A channel the user must belong to: either a numeric id or a public handle.
///
/// Handles are stored without the leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelRef {
    Id(i64),
    Handle(String),
}

impl FromStr for ChannelRef {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let raw = input.trim();
        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return raw
                .parse::<i64>()
                .map(Self::Id)
                .map_err(|_| Error::invalid_channel_ref(raw));
        }

        let handle = raw.strip_prefix('@').unwrap_or(raw);
        if handle.is_empty() || !handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_channel_ref(raw));
        }
        Ok(Self::Handle(handle.to_string()))
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Handle(handle) => write!(f, "@{handle}"),
        }
    }
}

/// One required channel in a scope, with whatever display metadata is known.
///
/// Serialized with the field names of the `forcesubs` record
/// (`id`, `title`, `handle`, `link`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRequirement {
    #[serde(rename = "id")]
    pub channel: ChannelRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, rename = "link", skip_serializing_if = "Option::is_none")]
    pub invite_link: Option<String>,
}

impl ChannelRequirement {
    /// A requirement with no display metadata yet; resolved lazily.
    pub fn bare(channel: ChannelRef) -> Self {
        let handle = match &channel {
            ChannelRef::Handle(h) => Some(h.clone()),
            ChannelRef::Id(_) => None,
        };
        Self {
            channel,
            title: None,
            handle,
            invite_link: None,
        }
    }

    /// Title for display, falling back to the raw reference.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.channel.to_string())
    }
}

/// Result of parsing a whitespace-separated channel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChannels {
    /// At most [`MAX_REQUIRED_CHANNELS`] references, in input order.
    pub channels: Vec<ChannelRef>,
    /// Raw tokens that were dropped because the cap was reached.
    pub dropped: Vec<String>,
}

impl ParsedChannels {
    pub fn truncated(&self) -> bool {
        !self.dropped.is_empty()
    }
}

/// Parse channel tokens, keeping the first [`MAX_REQUIRED_CHANNELS`].
///
/// Tokens past the cap are reported in `dropped` and never validated. A
/// malformed token within the cap is an error.
pub fn parse_channel_list<'a, I>(tokens: I) -> Result<ParsedChannels>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut channels = Vec::new();
    let mut dropped = Vec::new();
    for token in tokens.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
        if channels.len() == MAX_REQUIRED_CHANNELS {
            dropped.push(token.to_string());
            continue;
        }
        channels.push(token.parse()?);
    }
    Ok(ParsedChannels { channels, dropped })
}
