//! Conversion of Telegram updates into platform-neutral inbound events.

use {
    joingate_channels::{
        CallbackEvent, InboundEvent, MembershipChange, MembershipEvent, MessageEvent, MessageRef,
        Sender,
    },
    joingate_common::types::ChatType,
    teloxide::types::{
        CallbackQuery, Chat, ChatKind, ChatMemberUpdated, Message, PublicChatKind, Update,
        UpdateKind, User,
    },
    tracing::debug,
};

/// Translate one update. Returns `None` for updates the bot does not act on.
pub fn inbound_event(update: Update) -> Option<InboundEvent> {
    match update.kind {
        UpdateKind::Message(msg) => message_event(&msg).map(InboundEvent::Message),
        UpdateKind::CallbackQuery(query) => callback_event(query).map(InboundEvent::Callback),
        UpdateKind::MyChatMember(change) => {
            membership_event(&change).map(InboundEvent::Membership)
        },
        other => {
            debug!("ignoring telegram update: {other:?}");
            None
        },
    }
}

fn classify_chat(chat: &Chat) -> ChatType {
    match chat.kind {
        ChatKind::Private(_) => ChatType::Private,
        ChatKind::Public(ref p) => match p.kind {
            PublicChatKind::Channel(_) => ChatType::Channel,
            _ => ChatType::Group,
        },
    }
}

fn user_id(user: &User) -> i64 {
    i64::try_from(user.id.0).unwrap_or(i64::MAX)
}

fn sender(user: &User) -> Sender {
    let first = &user.first_name;
    let last = user.last_name.as_deref().unwrap_or("");
    let name = format!("{first} {last}").trim().to_string();
    let display_name = if name.is_empty() {
        user.username.clone().unwrap_or_else(|| user.id.0.to_string())
    } else {
        name
    };
    Sender {
        id: user_id(user),
        display_name,
        username: user.username.clone(),
    }
}

/// Messages without a human sender (channel posts, anonymous admins posting
/// as the group) are skipped.
pub fn message_event(msg: &Message) -> Option<MessageEvent> {
    let Some(from) = msg.from.as_ref().filter(|u| !u.is_bot) else {
        debug!(chat_id = msg.chat.id.0, "message without a user sender");
        return None;
    };
    let chat_type = classify_chat(&msg.chat);
    if chat_type == ChatType::Channel {
        return None;
    }
    Some(MessageEvent {
        message: MessageRef {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
        },
        chat_type,
        sender: sender(from),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        reply_to: msg.reply_to_message().map(|r| MessageRef {
            chat_id: r.chat.id.0,
            message_id: r.id.0,
        }),
    })
}

pub fn callback_event(query: CallbackQuery) -> Option<CallbackEvent> {
    let data = query.data?;
    Some(CallbackEvent {
        sender: sender(&query.from),
        message: query.message.as_ref().map(|m| MessageRef {
            chat_id: m.chat().id.0,
            message_id: m.id().0,
        }),
        id: query.id,
        data,
    })
}

/// Only transitions of the bot's own presence matter: joined or left.
pub fn membership_event(update: &ChatMemberUpdated) -> Option<MembershipEvent> {
    let was_present = update.old_chat_member.is_present();
    let is_present = update.new_chat_member.is_present();
    let change = match (was_present, is_present) {
        (false, true) => MembershipChange::BotAdded,
        (true, false) => MembershipChange::BotRemoved,
        _ => return None,
    };
    Some(MembershipEvent {
        chat_id: update.chat.id.0,
        chat_type: classify_chat(&update.chat),
        change,
        actor: Some(user_id(&update.from)),
    })
}
