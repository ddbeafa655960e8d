use {
    async_trait::async_trait,
    joingate_common::types::{ChannelRef, GroupId, UserId},
    serde::{Deserialize, Serialize},
};

use crate::{Result, keyboard::Keyboard};

/// Address of a message that has been sent or received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Channel metadata returned by [`MessagingPlatform::resolve_entity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: i64,
    pub title: String,
    /// Public handle without `@`, if the channel has one.
    pub handle: Option<String>,
}

/// Outcome of a successful membership query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Member,
    NotMember,
}

/// A user's rank in a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminRank {
    pub is_creator: bool,
    pub is_admin: bool,
}

impl AdminRank {
    pub fn is_privileged(self) -> bool {
        self.is_creator || self.is_admin
    }
}

/// A message to send or the new content of an edited message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub buttons: Keyboard,
    /// Message id in the same chat to reply to.
    pub reply_to: Option<i32>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_buttons(mut self, buttons: Keyboard) -> Self {
        self.buttons = buttons;
        self
    }

    #[must_use]
    pub fn in_reply_to(mut self, message_id: i32) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// Operations the gate and broadcast engines need from a chat platform.
///
/// Every method is a single network round-trip; callers own retries and
/// timeouts.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Resolve a channel id or handle to its metadata.
    async fn resolve_entity(&self, channel: &ChannelRef) -> Result<ChannelInfo>;

    /// Whether `user` currently participates in `channel_id`.
    async fn check_membership(&self, channel_id: i64, user: UserId) -> Result<MemberStatus>;

    /// Export an invite link for a channel without a public handle.
    async fn create_invite_link(&self, channel_id: i64) -> Result<String>;

    /// Public URL for a channel handle.
    fn public_url(&self, handle: &str) -> String;

    async fn send_message(&self, chat_id: i64, message: &OutgoingMessage) -> Result<MessageRef>;

    /// Forward an existing message into `chat_id`.
    async fn forward_message(&self, chat_id: i64, source: MessageRef) -> Result<MessageRef>;

    async fn edit_message(&self, target: MessageRef, message: &OutgoingMessage) -> Result<()>;

    async fn delete_message(&self, target: MessageRef) -> Result<()>;

    async fn pin_message(&self, target: MessageRef, silent: bool) -> Result<()>;

    async fn get_admin_rank(&self, group: GroupId, user: UserId) -> Result<AdminRank>;

    /// Acknowledge a button press, optionally with a toast or alert.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, alert: bool)
    -> Result<()>;
}
