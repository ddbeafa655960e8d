//! Bot commands, button presses and membership changes.

use std::sync::Arc;

use {
    async_trait::async_trait,
    joingate_channels::{
        CallbackEvent, MembershipChange, MembershipEvent, MessageEvent, MessagingPlatform,
        OutgoingMessage,
    },
    joingate_common::types::{
        ChannelRef, ChannelRequirement, GroupId, MAX_REQUIRED_CHANNELS, UserId, parse_channel_list,
    },
    joingate_store::SubscriptionStore,
    tokio::{sync::Mutex, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::{
    Result,
    authz::Authorizer,
    broadcast::{BroadcastContent, Broadcaster},
    callback::CallbackAction,
    dispatch::Listener,
    middleware::{EventContext, EventGate},
    policy::{Decision, MissingChannel},
    prompt,
};

/// Commands that change a group's configuration. They skip membership
/// evaluation and are checked against admin rights instead.
const CONFIG_COMMANDS: &[&str] = &["set", "reset", "fsub"];

/// A `/name args` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    /// Lowercased, without the leading `/` or a trailing `@botname`.
    pub name: String,
    /// Everything after the name, trimmed.
    pub args: &'a str,
}

impl Command<'_> {
    pub fn is_config(&self) -> bool {
        CONFIG_COMMANDS.contains(&self.name.as_str())
    }
}

pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let body = text.trim_start().strip_prefix('/')?;
    let (head, args) = body
        .split_once(char::is_whitespace)
        .unwrap_or((body, ""));
    let name = head.split('@').next().unwrap_or_default();
    if name.is_empty() {
        return None;
    }
    Some(Command {
        name: name.to_ascii_lowercase(),
        args: args.trim(),
    })
}

struct ActiveBroadcast {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Handles every command the bot understands.
pub struct CommandRouter {
    platform: Arc<dyn MessagingPlatform>,
    store: Arc<dyn SubscriptionStore>,
    gate: Arc<EventGate>,
    authz: Authorizer,
    broadcaster: Arc<Broadcaster>,
    active: Mutex<Option<ActiveBroadcast>>,
}

impl CommandRouter {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        store: Arc<dyn SubscriptionStore>,
        gate: Arc<EventGate>,
        authz: Authorizer,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            platform,
            store,
            gate,
            authz,
            broadcaster,
            active: Mutex::new(None),
        }
    }

    /// Cancel a running broadcast and wait for its report.
    pub async fn shutdown(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        active.cancel.cancel();
        if let Err(e) = active.handle.await {
            warn!(error = %e, "broadcast task failed");
        }
    }

    async fn reply(&self, event: &MessageEvent, text: impl Into<String>) -> Result<()> {
        self.send(event, OutgoingMessage::text(text)).await
    }

    async fn send(&self, event: &MessageEvent, message: OutgoingMessage) -> Result<()> {
        self.platform
            .send_message(
                event.chat_id(),
                &message.in_reply_to(event.message.message_id),
            )
            .await?;
        Ok(())
    }

    async fn handle(&self, event: &MessageEvent, name: &str, args: &str) -> Result<()> {
        match name {
            "start" => self.reply(event, prompt::start_text(&event.sender)).await,
            "help" => self.reply(event, prompt::HELP_TEXT).await,
            "set" | "fsub" | "reset" => {
                let Some(group) = event.group_id() else {
                    return self.reply(event, prompt::GROUP_ONLY_TEXT).await;
                };
                if !self.authz.is_authorized(group, event.sender.id).await {
                    return self.reply(event, prompt::ADMIN_ONLY_TEXT).await;
                }
                match name {
                    "set" => self.set_channels(event, group, args).await,
                    "fsub" => self.fsub(event, group, args).await,
                    _ => self.reset(event, group).await,
                }
            },
            "stats" | "broadcast" | "cancel" | "ban" | "unban" => {
                if !self.authz.is_owner(event.sender.id) {
                    return self.reply(event, prompt::OWNER_ONLY_TEXT).await;
                }
                match name {
                    "stats" => self.stats(event).await,
                    "broadcast" => self.start_broadcast(event, args).await,
                    "cancel" => self.cancel_broadcast(event).await,
                    "ban" => self.set_ban(event, args, true).await,
                    _ => self.set_ban(event, args, false).await,
                }
            },
            _ => Ok(()),
        }
    }

    async fn set_channels(&self, event: &MessageEvent, group: GroupId, args: &str) -> Result<()> {
        const USAGE: &str = "Usage: /set <channel> [channel...] with channel ids or @handles.";
        let parsed = match parse_channel_list(args.split_whitespace()) {
            Ok(parsed) if !parsed.channels.is_empty() => parsed,
            Ok(_) => return self.reply(event, USAGE).await,
            Err(e) => return self.reply(event, format!("{e}\n{USAGE}")).await,
        };

        let mut requirements = Vec::with_capacity(parsed.channels.len());
        for channel in &parsed.channels {
            let info = match self.platform.resolve_entity(channel).await {
                Ok(info) => info,
                Err(e) => {
                    warn!(group, channel = %channel, error = %e, "channel not resolvable");
                    return self
                        .reply(
                            event,
                            format!(
                                "I can't access {channel}. Make sure it exists and I'm an admin there. Nothing was changed."
                            ),
                        )
                        .await;
                },
            };
            let invite_link = match info.handle {
                Some(_) => None,
                None => match self.platform.create_invite_link(info.id).await {
                    Ok(link) => Some(link),
                    Err(e) => {
                        warn!(group, channel_id = info.id, error = %e, "could not export invite link");
                        None
                    },
                },
            };
            requirements.push(ChannelRequirement {
                channel: ChannelRef::Id(info.id),
                title: Some(info.title),
                handle: info.handle,
                invite_link,
            });
        }

        let config = self.store.set_channels(group, requirements).await?;
        info!(group, channels = config.channels.len(), user = event.sender.id, "group channels set");

        let list: Vec<String> = config
            .channels
            .iter()
            .map(|c| format!("- {}", c.display_title()))
            .collect();
        let mut text = format!(
            "Force-subscribe is on. Members must join:\n{}",
            list.join("\n")
        );
        if parsed.truncated() {
            text.push_str(&format!(
                "\n\nOnly {MAX_REQUIRED_CHANNELS} channels are allowed; ignored: {}",
                parsed.dropped.join(" ")
            ));
        }
        self.reply(event, text).await
    }

    async fn fsub(&self, event: &MessageEvent, group: GroupId, args: &str) -> Result<()> {
        let enabled = match args.to_ascii_lowercase().as_str() {
            "" => {
                let config = self.store.get_subscription(group).await?;
                return self
                    .send(event, prompt::fsub_status(group, config.as_ref()))
                    .await;
            },
            "on" => self.store.set_enabled(group, true).await?.map(|c| c.enabled),
            "off" => self.store.set_enabled(group, false).await?.map(|c| c.enabled),
            "toggle" => self.store.toggle_enabled(group).await?,
            _ => return self.reply(event, "Usage: /fsub [on|off|toggle]").await,
        };
        match enabled {
            Some(enabled) => {
                info!(group, enabled, "group enforcement switched");
                self.reply(event, format!("Force-subscribe is now {}.", on_off(enabled)))
                    .await
            },
            None => {
                self.reply(event, "No channels are configured. Use /set first.")
                    .await
            },
        }
    }

    async fn reset(&self, event: &MessageEvent, group: GroupId) -> Result<()> {
        if self.store.reset(group).await? {
            info!(group, user = event.sender.id, "group configuration reset");
            self.reply(event, "Force-subscribe settings removed for this group.")
                .await
        } else {
            self.reply(event, "This group has no force-subscribe settings.")
                .await
        }
    }

    async fn stats(&self, event: &MessageEvent) -> Result<()> {
        let users = self.store.count_users().await?;
        let groups = self.store.count_groups().await?;
        let banned = self.store.count_banned().await?;
        self.reply(
            event,
            format!("Users: {users}\nGroups: {groups}\nBanned: {banned}"),
        )
        .await
    }

    async fn start_broadcast(&self, event: &MessageEvent, args: &str) -> Result<()> {
        let text = (!args.is_empty()).then(|| args.to_string());
        let content = match BroadcastContent::from_parts(text, event.reply_to) {
            Ok(content) => content,
            Err(e) => {
                return self
                    .reply(
                        event,
                        format!(
                            "{e}.\nUsage: /broadcast <text>, or reply to a message with /broadcast."
                        ),
                    )
                    .await;
            },
        };

        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|a| !a.handle.is_finished()) {
            drop(active);
            return self
                .reply(event, "A broadcast is already running. Use /cancel to stop it.")
                .await;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let broadcaster = Arc::clone(&self.broadcaster);
        let platform = Arc::clone(&self.platform);
        let chat_id = event.chat_id();
        info!(user = event.sender.id, "broadcast requested");
        let handle = tokio::spawn(async move {
            if let Err(e) = broadcaster
                .broadcast_with_report(chat_id, &content, &token)
                .await
            {
                warn!(error = %e, "broadcast aborted");
                let notice = OutgoingMessage::text(format!("Broadcast failed: {e}"));
                if let Err(e) = platform.send_message(chat_id, &notice).await {
                    warn!(chat_id, error = %e, "could not report broadcast failure");
                }
            }
        });
        *active = Some(ActiveBroadcast { cancel, handle });
        Ok(())
    }

    async fn cancel_broadcast(&self, event: &MessageEvent) -> Result<()> {
        let running = {
            let active = self.active.lock().await;
            match active.as_ref() {
                Some(a) if !a.handle.is_finished() => {
                    a.cancel.cancel();
                    true
                },
                _ => false,
            }
        };
        if running {
            self.reply(event, "Cancelling the broadcast...").await
        } else {
            self.reply(event, "No broadcast is running.").await
        }
    }

    async fn set_ban(&self, event: &MessageEvent, args: &str, ban: bool) -> Result<()> {
        let usage = if ban {
            "Usage: /ban <user id>"
        } else {
            "Usage: /unban <user id>"
        };
        let Ok(user) = args.parse::<UserId>() else {
            return self.reply(event, usage).await;
        };
        if ban && self.authz.is_owner(user) {
            return self.reply(event, "You can't ban yourself.").await;
        }

        let changed = if ban {
            self.store.ban_user(user).await?
        } else {
            self.store.unban_user(user).await?
        };
        info!(user, ban, changed, "ban flag updated");
        let text = match (ban, changed) {
            (true, true) => format!("User {user} is now banned."),
            (true, false) => format!("User {user} is already banned."),
            (false, true) => format!("User {user} is no longer banned."),
            (false, false) => format!("User {user} was not banned."),
        };
        self.reply(event, text).await
    }

    async fn answer(&self, callback: &CallbackEvent, text: &str, alert: bool) {
        if let Err(e) = self
            .platform
            .answer_callback(&callback.id, Some(text), alert)
            .await
        {
            warn!(callback = %callback.data, error = %e, "could not answer callback");
        }
    }

    async fn confirm_joined(&self, callback: &CallbackEvent, group: GroupId) {
        match self.gate.recheck_group(&callback.sender, group).await {
            Ok(Decision::Allow) => {
                self.answer(callback, "Thanks! You can send messages now.", false)
                    .await;
            },
            Ok(Decision::Deny(missing)) => {
                let titles: Vec<String> = missing.iter().map(MissingChannel::title).collect();
                self.answer(
                    callback,
                    &format!("You still need to join: {}", titles.join(", ")),
                    true,
                )
                .await;
            },
            Err(e) => {
                warn!(group, user = callback.sender.id, error = %e, "confirm re-check failed");
                self.answer(callback, prompt::UNAVAILABLE_TEXT, true).await;
            },
        }
    }

    async fn switch_enforcement(&self, callback: &CallbackEvent, group: GroupId, enabled: bool) {
        if !self.authz.is_authorized(group, callback.sender.id).await {
            self.answer(callback, prompt::ADMIN_ONLY_TEXT, true).await;
            return;
        }
        match self.store.set_enabled(group, enabled).await {
            Ok(Some(config)) => {
                info!(group, enabled, user = callback.sender.id, "group enforcement switched");
                if let Some(message) = callback.message
                    && let Err(e) = self
                        .platform
                        .edit_message(message, &prompt::fsub_status(group, Some(&config)))
                        .await
                {
                    warn!(group, error = %e, "could not refresh status message");
                }
                self.answer(
                    callback,
                    &format!("Force-subscribe is now {}.", on_off(enabled)),
                    false,
                )
                .await;
            },
            Ok(None) => {
                self.answer(callback, "No channels are configured.", true)
                    .await;
            },
            Err(e) => {
                warn!(group, error = %e, "could not switch enforcement");
                self.answer(callback, prompt::UNAVAILABLE_TEXT, true).await;
            },
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

#[async_trait]
impl Listener for CommandRouter {
    fn name(&self) -> &str {
        "commands"
    }

    async fn on_message(&self, ctx: &EventContext) -> Result<()> {
        let Some(command) = ctx.command() else {
            return Ok(());
        };
        let event = &ctx.event;
        let result = self.handle(event, &command.name, command.args).await;
        if result.is_err()
            && let Err(e) = self
                .reply(event, "Something went wrong. Please try again later.")
                .await
        {
            warn!(chat_id = event.chat_id(), error = %e, "could not send failure reply");
        }
        result
    }

    async fn on_callback(&self, callback: &CallbackEvent) -> Result<bool> {
        let Ok(action) = callback.data.parse::<CallbackAction>() else {
            return Ok(false);
        };
        match action {
            CallbackAction::Confirm(group) => self.confirm_joined(callback, group).await,
            CallbackAction::SetEnabled { group, enabled } => {
                self.switch_enforcement(callback, group, enabled).await;
            },
        }
        Ok(true)
    }

    async fn on_membership(&self, event: &MembershipEvent) -> Result<()> {
        if !event.chat_type.is_group() {
            return Ok(());
        }
        match event.change {
            MembershipChange::BotAdded => {
                info!(group = event.chat_id, actor = ?event.actor, "bot added to group");
                self.gate.register_group(event.chat_id).await;
            },
            MembershipChange::BotRemoved => {
                self.store.remove_group(event.chat_id).await?;
                self.store.reset(event.chat_id).await?;
                info!(
                    group = event.chat_id,
                    actor = ?event.actor,
                    "bot removed from group, settings dropped"
                );
            },
        }
        Ok(())
    }
}
