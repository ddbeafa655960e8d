use std::sync::Arc;

use {
    joingate_channels::MessagingPlatform,
    joingate_common::types::{GroupId, UserId},
    tracing::warn,
};

/// Decides who may change a group's configuration and who is the owner.
#[derive(Clone)]
pub struct Authorizer {
    platform: Arc<dyn MessagingPlatform>,
    owner_id: UserId,
}

impl Authorizer {
    pub fn new(platform: Arc<dyn MessagingPlatform>, owner_id: UserId) -> Self {
        Self { platform, owner_id }
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        user == self.owner_id
    }

    /// Owner, group creator or group administrator. Lookup failures deny.
    pub async fn is_authorized(&self, group: GroupId, user: UserId) -> bool {
        if self.is_owner(user) {
            return true;
        }
        match self.platform.get_admin_rank(group, user).await {
            Ok(rank) => rank.is_privileged(),
            Err(e) => {
                warn!(group, user, error = %e, "admin rank lookup failed");
                false
            },
        }
    }
}
