//! Persistence trait for the subscription registry.

use {
    async_trait::async_trait,
    joingate_common::types::{ChannelRequirement, GroupId, UserId},
};

use crate::{Result, types::SubscriptionConfig};

/// The four registry collections: `users`, `group_chats`, `forcesubs`,
/// `banned_users`.
///
/// Mutations keyed by group id are single atomic upserts or deletes; two
/// writers on the same group resolve last-writer-wins.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Register a user. Returns `true` if the user was not known before.
    async fn add_user(&self, user: UserId) -> Result<bool>;
    /// All known users, in registration order.
    async fn list_users(&self) -> Result<Vec<UserId>>;
    async fn count_users(&self) -> Result<u64>;

    /// Register a group. Returns `true` if the group was not known before.
    async fn add_group(&self, group: GroupId) -> Result<bool>;
    async fn remove_group(&self, group: GroupId) -> Result<()>;
    /// All known groups, in registration order.
    async fn list_groups(&self) -> Result<Vec<GroupId>>;
    async fn count_groups(&self) -> Result<u64>;

    async fn get_subscription(&self, group: GroupId) -> Result<Option<SubscriptionConfig>>;
    /// Replace the group's whole channel list and enable it.
    async fn set_channels(
        &self,
        group: GroupId,
        channels: Vec<ChannelRequirement>,
    ) -> Result<SubscriptionConfig>;
    /// Set the enabled flag. Returns `None` if the group has no config.
    async fn set_enabled(&self, group: GroupId, enabled: bool)
    -> Result<Option<SubscriptionConfig>>;
    /// Flip the enabled flag. Returns the new value, or `None` without config.
    async fn toggle_enabled(&self, group: GroupId) -> Result<Option<bool>>;
    /// Delete the group's config and forget the group. Returns `true` if a
    /// config existed.
    async fn reset(&self, group: GroupId) -> Result<bool>;

    /// Returns `true` if the user was not banned before.
    async fn ban_user(&self, user: UserId) -> Result<bool>;
    /// Returns `true` if the user was banned before.
    async fn unban_user(&self, user: UserId) -> Result<bool>;
    async fn is_banned(&self, user: UserId) -> Result<bool>;
    async fn count_banned(&self) -> Result<u64>;
}
