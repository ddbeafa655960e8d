//! Scripted [`MessagingPlatform`] for unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicI32, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    joingate_channels::{
        AdminRank, ChannelInfo, Error, MemberStatus, MessageRef, MessagingPlatform,
        OutgoingMessage, Result, Sender,
    },
    joingate_common::types::{ChannelRef, ChannelRequirement, GroupId, UserId},
    joingate_store::{SubscriptionConfig, SubscriptionStore},
};

#[derive(Default)]
pub struct MockPlatform {
    channels: Vec<ChannelInfo>,
    members: HashSet<(i64, UserId)>,
    failing_membership: HashSet<i64>,
    failing_invites: HashSet<i64>,
    membership_delay: Option<Duration>,
    admins: HashMap<(GroupId, UserId), AdminRank>,
    failing_sends: HashSet<i64>,
    failing_pins: HashSet<i64>,
    failing_deletes: bool,
    next_message_id: AtomicI32,
    pub membership_calls: AtomicUsize,
    pub sent: Mutex<Vec<(i64, OutgoingMessage)>>,
    pub forwarded: Mutex<Vec<(i64, MessageRef)>>,
    pub edited: Mutex<Vec<(MessageRef, OutgoingMessage)>>,
    pub deleted: Mutex<Vec<MessageRef>>,
    pub pinned: Mutex<Vec<MessageRef>>,
    pub answers: Mutex<Vec<(String, Option<String>, bool)>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI32::new(1000),
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, id: i64, title: &str, handle: Option<&str>) -> Self {
        self.channels.push(ChannelInfo {
            id,
            title: title.into(),
            handle: handle.map(Into::into),
        });
        self
    }

    pub fn with_member(mut self, channel: i64, user: UserId) -> Self {
        self.members.insert((channel, user));
        self
    }

    pub fn with_failing_membership(mut self, channel: i64) -> Self {
        self.failing_membership.insert(channel);
        self
    }

    pub fn with_failing_invite(mut self, channel: i64) -> Self {
        self.failing_invites.insert(channel);
        self
    }

    pub fn with_membership_delay(mut self, delay: Duration) -> Self {
        self.membership_delay = Some(delay);
        self
    }

    pub fn with_admin(mut self, group: GroupId, user: UserId) -> Self {
        self.admins.insert((group, user), AdminRank {
            is_creator: false,
            is_admin: true,
        });
        self
    }

    pub fn with_failing_send(mut self, chat_id: i64) -> Self {
        self.failing_sends.insert(chat_id);
        self
    }

    pub fn with_failing_pin(mut self, chat_id: i64) -> Self {
        self.failing_pins.insert(chat_id);
        self
    }

    pub fn with_failing_deletes(mut self) -> Self {
        self.failing_deletes = true;
        self
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    pub fn last_answer(&self) -> Option<(String, Option<String>, bool)> {
        self.answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    fn next_ref(&self, chat_id: i64) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

pub fn sender(id: UserId) -> Sender {
    Sender {
        id,
        display_name: format!("User {id}"),
        username: None,
    }
}

#[async_trait]
impl MessagingPlatform for MockPlatform {
    async fn resolve_entity(&self, channel: &ChannelRef) -> Result<ChannelInfo> {
        self.channels
            .iter()
            .find(|info| match channel {
                ChannelRef::Id(id) => info.id == *id,
                ChannelRef::Handle(h) => info.handle.as_deref() == Some(h.as_str()),
            })
            .cloned()
            .ok_or_else(|| Error::not_found(channel))
    }

    async fn check_membership(&self, channel_id: i64, user: UserId) -> Result<MemberStatus> {
        self.membership_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.membership_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_membership.contains(&channel_id) {
            return Err(Error::forbidden("member list is inaccessible"));
        }
        Ok(if self.members.contains(&(channel_id, user)) {
            MemberStatus::Member
        } else {
            MemberStatus::NotMember
        })
    }

    async fn create_invite_link(&self, channel_id: i64) -> Result<String> {
        if self.failing_invites.contains(&channel_id) {
            return Err(Error::forbidden("not enough rights to export chat invite link"));
        }
        Ok(format!("https://t.me/+invite{}", channel_id.unsigned_abs()))
    }

    fn public_url(&self, handle: &str) -> String {
        format!("https://t.me/{handle}")
    }

    async fn send_message(&self, chat_id: i64, message: &OutgoingMessage) -> Result<MessageRef> {
        if self.failing_sends.contains(&chat_id) {
            return Err(Error::forbidden("bot was blocked by the user"));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((chat_id, message.clone()));
        Ok(self.next_ref(chat_id))
    }

    async fn forward_message(&self, chat_id: i64, source: MessageRef) -> Result<MessageRef> {
        if self.failing_sends.contains(&chat_id) {
            return Err(Error::forbidden("bot was kicked from the group chat"));
        }
        self.forwarded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((chat_id, source));
        Ok(self.next_ref(chat_id))
    }

    async fn edit_message(&self, target: MessageRef, message: &OutgoingMessage) -> Result<()> {
        self.edited
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target, message.clone()));
        Ok(())
    }

    async fn delete_message(&self, target: MessageRef) -> Result<()> {
        if self.failing_deletes {
            return Err(Error::forbidden("message can't be deleted"));
        }
        self.deleted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(target);
        Ok(())
    }

    async fn pin_message(&self, target: MessageRef, _silent: bool) -> Result<()> {
        if self.failing_pins.contains(&target.chat_id) {
            return Err(Error::forbidden("not enough rights to pin a message"));
        }
        self.pinned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(target);
        Ok(())
    }

    async fn get_admin_rank(&self, group: GroupId, user: UserId) -> Result<AdminRank> {
        if self.failing_membership.contains(&group) {
            return Err(Error::api("chat not found"));
        }
        Ok(self.admins.get(&(group, user)).copied().unwrap_or_default())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<()> {
        self.answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((callback_id.to_string(), text.map(Into::into), alert));
        Ok(())
    }
}

/// Registry whose every call fails.
pub struct FailingStore;

fn unavailable<T>() -> joingate_store::Result<T> {
    Err(joingate_store::Error::message("database is locked"))
}

#[async_trait]
impl SubscriptionStore for FailingStore {
    async fn add_user(&self, _user: UserId) -> joingate_store::Result<bool> {
        unavailable()
    }

    async fn list_users(&self) -> joingate_store::Result<Vec<UserId>> {
        unavailable()
    }

    async fn count_users(&self) -> joingate_store::Result<u64> {
        unavailable()
    }

    async fn add_group(&self, _group: GroupId) -> joingate_store::Result<bool> {
        unavailable()
    }

    async fn remove_group(&self, _group: GroupId) -> joingate_store::Result<()> {
        unavailable()
    }

    async fn list_groups(&self) -> joingate_store::Result<Vec<GroupId>> {
        unavailable()
    }

    async fn count_groups(&self) -> joingate_store::Result<u64> {
        unavailable()
    }

    async fn get_subscription(
        &self,
        _group: GroupId,
    ) -> joingate_store::Result<Option<SubscriptionConfig>> {
        unavailable()
    }

    async fn set_channels(
        &self,
        _group: GroupId,
        _channels: Vec<ChannelRequirement>,
    ) -> joingate_store::Result<SubscriptionConfig> {
        unavailable()
    }

    async fn set_enabled(
        &self,
        _group: GroupId,
        _enabled: bool,
    ) -> joingate_store::Result<Option<SubscriptionConfig>> {
        unavailable()
    }

    async fn toggle_enabled(&self, _group: GroupId) -> joingate_store::Result<Option<bool>> {
        unavailable()
    }

    async fn reset(&self, _group: GroupId) -> joingate_store::Result<bool> {
        unavailable()
    }

    async fn ban_user(&self, _user: UserId) -> joingate_store::Result<bool> {
        unavailable()
    }

    async fn unban_user(&self, _user: UserId) -> joingate_store::Result<bool> {
        unavailable()
    }

    async fn is_banned(&self, _user: UserId) -> joingate_store::Result<bool> {
        unavailable()
    }

    async fn count_banned(&self) -> joingate_store::Result<u64> {
        unavailable()
    }
}
