//! In-memory store for tests and throwaway runs.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use {
    async_trait::async_trait,
    joingate_common::types::{ChannelRequirement, GroupId, UserId},
};

use crate::{Result, store::SubscriptionStore, types::SubscriptionConfig};

/// Insertion-ordered set of ids.
#[derive(Default)]
struct OrderedIds {
    order: Vec<i64>,
    seen: HashSet<i64>,
}

impl OrderedIds {
    fn insert(&mut self, id: i64) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push(id);
        true
    }

    fn remove(&mut self, id: i64) -> bool {
        if !self.seen.remove(&id) {
            return false;
        }
        self.order.retain(|x| *x != id);
        true
    }
}

#[derive(Default)]
struct State {
    users: OrderedIds,
    groups: OrderedIds,
    forcesubs: HashMap<GroupId, SubscriptionConfig>,
    banned: HashSet<UserId>,
}

/// Registry backed by plain collections behind one mutex. No persistence.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn add_user(&self, user: UserId) -> Result<bool> {
        Ok(self.with_state(|s| s.users.insert(user)))
    }

    async fn list_users(&self) -> Result<Vec<UserId>> {
        Ok(self.with_state(|s| s.users.order.clone()))
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.with_state(|s| s.users.order.len() as u64))
    }

    async fn add_group(&self, group: GroupId) -> Result<bool> {
        Ok(self.with_state(|s| s.groups.insert(group)))
    }

    async fn remove_group(&self, group: GroupId) -> Result<()> {
        self.with_state(|s| s.groups.remove(group));
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<GroupId>> {
        Ok(self.with_state(|s| s.groups.order.clone()))
    }

    async fn count_groups(&self) -> Result<u64> {
        Ok(self.with_state(|s| s.groups.order.len() as u64))
    }

    async fn get_subscription(&self, group: GroupId) -> Result<Option<SubscriptionConfig>> {
        Ok(self.with_state(|s| s.forcesubs.get(&group).cloned()))
    }

    async fn set_channels(
        &self,
        group: GroupId,
        channels: Vec<ChannelRequirement>,
    ) -> Result<SubscriptionConfig> {
        let config = SubscriptionConfig::new(channels, true);
        self.with_state(|s| s.forcesubs.insert(group, config.clone()));
        Ok(config)
    }

    async fn set_enabled(
        &self,
        group: GroupId,
        enabled: bool,
    ) -> Result<Option<SubscriptionConfig>> {
        Ok(self.with_state(|s| {
            s.forcesubs.get_mut(&group).map(|cfg| {
                cfg.enabled = enabled;
                cfg.clone()
            })
        }))
    }

    async fn toggle_enabled(&self, group: GroupId) -> Result<Option<bool>> {
        Ok(self.with_state(|s| {
            s.forcesubs.get_mut(&group).map(|cfg| {
                cfg.enabled = !cfg.enabled;
                cfg.enabled
            })
        }))
    }

    async fn reset(&self, group: GroupId) -> Result<bool> {
        Ok(self.with_state(|s| {
            s.groups.remove(group);
            s.forcesubs.remove(&group).is_some()
        }))
    }

    async fn ban_user(&self, user: UserId) -> Result<bool> {
        Ok(self.with_state(|s| s.banned.insert(user)))
    }

    async fn unban_user(&self, user: UserId) -> Result<bool> {
        Ok(self.with_state(|s| s.banned.remove(&user)))
    }

    async fn is_banned(&self, user: UserId) -> Result<bool> {
        Ok(self.with_state(|s| s.banned.contains(&user)))
    }

    async fn count_banned(&self) -> Result<u64> {
        Ok(self.with_state(|s| s.banned.len() as u64))
    }
}
