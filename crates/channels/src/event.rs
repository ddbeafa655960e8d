use joingate_common::types::{ChatType, GroupId, UserId};

use crate::platform::MessageRef;

/// The user behind an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    /// First and last name joined, or the username when both are empty.
    pub display_name: String,
    pub username: Option<String>,
}

/// A new message in a private chat or group.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub message: MessageRef,
    pub chat_type: ChatType,
    pub sender: Sender,
    /// Text or caption.
    pub text: Option<String>,
    /// The message this one replies to, if any.
    pub reply_to: Option<MessageRef>,
}

impl MessageEvent {
    pub fn chat_id(&self) -> i64 {
        self.message.chat_id
    }

    pub fn is_private(&self) -> bool {
        self.chat_type == ChatType::Private
    }

    /// The group this message was posted in, if it was posted in one.
    pub fn group_id(&self) -> Option<GroupId> {
        self.chat_type.is_group().then_some(self.message.chat_id)
    }
}

/// What happened to the bot's own membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    BotAdded,
    BotRemoved,
}

/// The bot was added to or removed from a conversation.
#[derive(Debug, Clone)]
pub struct MembershipEvent {
    pub chat_id: GroupId,
    pub chat_type: ChatType,
    pub change: MembershipChange,
    /// Who performed the change, when the platform reports it.
    pub actor: Option<UserId>,
}

/// An inline button was pressed.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub id: String,
    pub sender: Sender,
    /// The message carrying the pressed button.
    pub message: Option<MessageRef>,
    pub data: String,
}

/// Any platform update the bot reacts to.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(MessageEvent),
    Membership(MembershipEvent),
    Callback(CallbackEvent),
}
