//! [`MessagingPlatform`] over the Telegram Bot API.

use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    joingate_channels::{
        AdminRank, Button, ChannelInfo, Error, Keyboard, MemberStatus, MessageRef,
        MessagingPlatform, OutgoingMessage, Result,
    },
    joingate_common::types::{ChannelRef, GroupId, UserId},
    teloxide::{
        ApiError, RequestError,
        payloads::{
            AnswerCallbackQuerySetters, EditMessageTextSetters, PinChatMessageSetters,
            SendMessageSetters,
        },
        prelude::*,
        types::{
            ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, Recipient,
            ReplyParameters,
        },
    },
    tracing::{debug, warn},
};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Run a request, sleeping through `RetryAfter` responses a bounded number
    /// of times. Other failures are mapped to the platform error type.
    async fn run_with_retry<T, F, Fut>(
        &self,
        chat_id: i64,
        operation: &'static str,
        mut request: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(map_request_error(operation, err));
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(map_request_error(operation, err));
                    }

                    retries += 1;
                    warn!(
                        chat_id,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn is_message_not_modified_error(error: &Error) -> bool {
    matches!(error, Error::Api { message } if message == "message is not modified")
}

pub(crate) fn map_request_error(operation: &'static str, error: RequestError) -> Error {
    match error {
        RequestError::RetryAfter(wait) => Error::RateLimited {
            retry_after_secs: wait.duration().as_secs(),
        },
        RequestError::Api(api) => match api {
            ApiError::ChatNotFound
            | ApiError::UserNotFound
            | ApiError::MessageToDeleteNotFound
            | ApiError::MessageToEditNotFound
            | ApiError::MessageIdInvalid => Error::not_found(format!("{operation}: {api}")),
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation
            | ApiError::MessageCantBeDeleted
            | ApiError::NotEnoughRightsToPinMessage => Error::forbidden(api),
            ApiError::MessageNotModified => Error::api("message is not modified"),
            other => Error::api(other),
        },
        other => Error::external(operation, other),
    }
}

fn recipient(channel: &ChannelRef) -> Recipient {
    match channel {
        ChannelRef::Id(id) => Recipient::Id(ChatId(*id)),
        ChannelRef::Handle(handle) => Recipient::ChannelUsername(format!("@{handle}")),
    }
}

#[allow(unused_qualifications)]
fn user_id(user: UserId) -> Result<teloxide::types::UserId> {
    u64::try_from(user)
        .map(teloxide::types::UserId)
        .map_err(|_| Error::invalid_input(format!("invalid user id {user}")))
}

pub(crate) fn inline_keyboard(buttons: &Keyboard) -> Result<Option<InlineKeyboardMarkup>> {
    if buttons.is_empty() {
        return Ok(None);
    }
    let rows = buttons
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match button {
                    Button::Url { label, url } => reqwest::Url::parse(url)
                        .map(|url| InlineKeyboardButton::url(label.clone(), url))
                        .map_err(|e| Error::invalid_input(format!("button url {url}: {e}"))),
                    Button::Callback { label, data } => {
                        Ok(InlineKeyboardButton::callback(label.clone(), data.clone()))
                    },
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(InlineKeyboardMarkup::new(rows)))
}

#[async_trait]
impl MessagingPlatform for TelegramPlatform {
    // Membership lookups are a single round-trip: a rate limit surfaces as an
    // error instead of stalling the gated event.
    async fn resolve_entity(&self, channel: &ChannelRef) -> Result<ChannelInfo> {
        let chat = self
            .bot
            .get_chat(recipient(channel))
            .await
            .map_err(|e| map_request_error("get chat", e))?;
        Ok(ChannelInfo {
            id: chat.id.0,
            title: chat
                .title()
                .map(str::to_string)
                .unwrap_or_else(|| channel.to_string()),
            handle: chat.username().map(str::to_string),
        })
    }

    async fn check_membership(&self, channel_id: i64, user: UserId) -> Result<MemberStatus> {
        let uid = user_id(user)?;
        let result = self
            .bot
            .get_chat_member(ChatId(channel_id), uid)
            .await
            .map_err(|e| map_request_error("get chat member", e));
        match result {
            Ok(member) if member.is_present() => Ok(MemberStatus::Member),
            Ok(_) => Ok(MemberStatus::NotMember),
            // Telegram answers "user not found" for users who never joined.
            Err(Error::NotFound { what }) if what.contains("user not found") => {
                Ok(MemberStatus::NotMember)
            },
            Err(e) => Err(e),
        }
    }

    async fn create_invite_link(&self, channel_id: i64) -> Result<String> {
        self.run_with_retry(channel_id, "export invite link", || {
            let req = self.bot.export_chat_invite_link(ChatId(channel_id));
            async move { req.await }
        })
        .await
    }

    fn public_url(&self, handle: &str) -> String {
        format!("https://t.me/{handle}")
    }

    async fn send_message(&self, chat_id: i64, message: &OutgoingMessage) -> Result<MessageRef> {
        let markup = inline_keyboard(&message.buttons)?;
        let sent = self
            .run_with_retry(chat_id, "send message", || {
                let mut req = self.bot.send_message(ChatId(chat_id), message.text.clone());
                if let Some(markup) = &markup {
                    req = req.reply_markup(markup.clone());
                }
                if let Some(reply_to) = message.reply_to {
                    req = req.reply_parameters(
                        ReplyParameters::new(MessageId(reply_to)).allow_sending_without_reply(),
                    );
                }
                async move { req.await }
            })
            .await?;
        Ok(MessageRef {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn forward_message(&self, chat_id: i64, source: MessageRef) -> Result<MessageRef> {
        let sent = self
            .run_with_retry(chat_id, "forward message", || {
                let req = self.bot.forward_message(
                    ChatId(chat_id),
                    ChatId(source.chat_id),
                    MessageId(source.message_id),
                );
                async move { req.await }
            })
            .await?;
        Ok(MessageRef {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn edit_message(&self, target: MessageRef, message: &OutgoingMessage) -> Result<()> {
        let markup = inline_keyboard(&message.buttons)?;
        let result = self
            .run_with_retry(target.chat_id, "edit message", || {
                let mut req = self.bot.edit_message_text(
                    ChatId(target.chat_id),
                    MessageId(target.message_id),
                    message.text.clone(),
                );
                if let Some(markup) = &markup {
                    req = req.reply_markup(markup.clone());
                }
                async move { req.await }
            })
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_message_not_modified_error(&e) => {
                debug!(chat_id = target.chat_id, "edit skipped, message not modified");
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    async fn delete_message(&self, target: MessageRef) -> Result<()> {
        self.run_with_retry(target.chat_id, "delete message", || {
            let req = self
                .bot
                .delete_message(ChatId(target.chat_id), MessageId(target.message_id));
            async move { req.await }
        })
        .await
        .map(|_| ())
    }

    async fn pin_message(&self, target: MessageRef, silent: bool) -> Result<()> {
        self.run_with_retry(target.chat_id, "pin message", || {
            let req = self
                .bot
                .pin_chat_message(ChatId(target.chat_id), MessageId(target.message_id))
                .disable_notification(silent);
            async move { req.await }
        })
        .await
        .map(|_| ())
    }

    async fn get_admin_rank(&self, group: GroupId, user: UserId) -> Result<AdminRank> {
        let uid = user_id(user)?;
        let member = self
            .run_with_retry(group, "get chat member", || {
                let req = self.bot.get_chat_member(ChatId(group), uid);
                async move { req.await }
            })
            .await?;
        Ok(AdminRank {
            is_creator: member.kind.is_owner(),
            is_admin: member.kind.is_administrator(),
        })
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<()> {
        self.run_with_retry(0, "answer callback", || {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(text) = text {
                req = req.text(text.to_string()).show_alert(alert);
            }
            async move { req.await }
        })
        .await
        .map(|_| ())
    }
}
