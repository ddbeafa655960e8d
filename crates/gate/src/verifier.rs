//! Membership checks against the messaging platform.

use std::{sync::Arc, time::Duration};

use {
    joingate_channels::{Error as PlatformError, MemberStatus, MessagingPlatform},
    joingate_common::types::{ChannelRef, UserId},
    tracing::{debug, warn},
};

/// Result of a single membership check. Never cached across events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOutcome {
    Member,
    NotMember,
    /// The platform could not answer: unresolvable channel, missing rights,
    /// transient failure or timeout.
    Indeterminate,
}

/// Answers "is this user in this channel" with no retries and no side effects.
#[derive(Clone)]
pub struct MembershipVerifier {
    platform: Arc<dyn MessagingPlatform>,
    timeout: Duration,
}

impl MembershipVerifier {
    pub fn new(platform: Arc<dyn MessagingPlatform>, timeout: Duration) -> Self {
        Self { platform, timeout }
    }

    pub async fn verify(&self, user: UserId, channel: &ChannelRef) -> MembershipOutcome {
        match tokio::time::timeout(self.timeout, self.query(user, channel)).await {
            Ok(Ok(MemberStatus::Member)) => MembershipOutcome::Member,
            Ok(Ok(MemberStatus::NotMember)) => MembershipOutcome::NotMember,
            Ok(Err(e)) => {
                warn!(
                    user,
                    channel = %channel,
                    transient = e.is_transient(),
                    error = %e,
                    "membership check failed"
                );
                MembershipOutcome::Indeterminate
            },
            Err(_) => {
                warn!(
                    user,
                    channel = %channel,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "membership check timed out"
                );
                MembershipOutcome::Indeterminate
            },
        }
    }

    async fn query(
        &self,
        user: UserId,
        channel: &ChannelRef,
    ) -> Result<MemberStatus, PlatformError> {
        let channel_id = match channel {
            ChannelRef::Id(id) => *id,
            ChannelRef::Handle(_) => self.platform.resolve_entity(channel).await?.id,
        };
        let status = self.platform.check_membership(channel_id, user).await?;
        debug!(user, channel_id, ?status, "membership checked");
        Ok(status)
    }
}
