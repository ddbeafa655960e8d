//! Two-scope enforcement policy.
//!
//! The global scope is the owner's list from the config file and applies to
//! everyone except the owner. The group scope is the per-group list stored in
//! the registry. Each scope is evaluated on its own; combining them is the
//! middleware's job.

use std::{fmt, sync::Arc};

use {
    joingate_channels::MessagingPlatform,
    joingate_common::types::{ChannelRef, ChannelRequirement, GroupId, UserId, MAX_REQUIRED_CHANNELS},
    joingate_config::IndeterminateMode,
    joingate_store::SubscriptionStore,
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    verifier::{MembershipOutcome, MembershipVerifier},
};

/// Which channel list a decision was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Group(GroupId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Group(id) => write!(f, "group:{id}"),
        }
    }
}

/// A button target for a channel the user still has to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingChannel {
    pub requirement: ChannelRequirement,
    /// `None` when no display data or link could be produced.
    pub link: Option<JoinLink>,
}

impl MissingChannel {
    pub fn title(&self) -> String {
        self.link
            .as_ref()
            .map(|l| l.title.clone())
            .unwrap_or_else(|| self.requirement.display_title())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Missing channels in configuration order. Never empty.
    Deny(Vec<MissingChannel>),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

pub struct EnforcementPolicy {
    platform: Arc<dyn MessagingPlatform>,
    store: Arc<dyn SubscriptionStore>,
    verifier: MembershipVerifier,
    owner_id: UserId,
    global: Vec<ChannelRequirement>,
    global_indeterminate: IndeterminateMode,
}

impl EnforcementPolicy {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        store: Arc<dyn SubscriptionStore>,
        verifier: MembershipVerifier,
        owner_id: UserId,
    ) -> Self {
        Self {
            platform,
            store,
            verifier,
            owner_id,
            global: Vec::new(),
            global_indeterminate: IndeterminateMode::default(),
        }
    }

    /// Set the global channel list. Entries past the cap are dropped.
    #[must_use]
    pub fn with_global_channels(mut self, mut channels: Vec<ChannelRef>) -> Self {
        if channels.len() > MAX_REQUIRED_CHANNELS {
            warn!(
                count = channels.len(),
                max = MAX_REQUIRED_CHANNELS,
                "truncating global channel list"
            );
            channels.truncate(MAX_REQUIRED_CHANNELS);
        }
        self.global = channels.into_iter().map(ChannelRequirement::bare).collect();
        self
    }

    #[must_use]
    pub fn with_global_indeterminate(mut self, mode: IndeterminateMode) -> Self {
        self.global_indeterminate = mode;
        self
    }

    pub fn global_channels(&self) -> &[ChannelRequirement] {
        &self.global
    }

    /// Evaluate one scope for one user.
    ///
    /// Every configured channel is checked; the result lists all missing
    /// ones. An `Err` means the registry could not be read.
    pub async fn evaluate(&self, user: UserId, scope: Scope) -> Result<Decision> {
        let (requirements, fail_closed) = match scope {
            Scope::Global => {
                if user == self.owner_id {
                    return Ok(Decision::Allow);
                }
                (
                    self.global.clone(),
                    self.global_indeterminate == IndeterminateMode::Deny,
                )
            },
            Scope::Group(group) => match self.store.get_subscription(group).await? {
                Some(config) if config.is_active() => (config.channels, true),
                _ => return Ok(Decision::Allow),
            },
        };
        if requirements.is_empty() {
            return Ok(Decision::Allow);
        }

        let outcomes = futures::future::join_all(
            requirements
                .iter()
                .map(|req| self.verifier.verify(user, &req.channel)),
        )
        .await;

        let mut missing = Vec::new();
        for (requirement, outcome) in requirements.into_iter().zip(outcomes) {
            match outcome {
                MembershipOutcome::Member => {},
                MembershipOutcome::NotMember => missing.push(requirement),
                MembershipOutcome::Indeterminate if fail_closed => missing.push(requirement),
                MembershipOutcome::Indeterminate => {
                    info!(
                        user,
                        %scope,
                        channel = %requirement.channel,
                        "membership unknown, not enforcing this channel"
                    );
                },
            }
        }

        if missing.is_empty() {
            debug!(user, %scope, "all required channels joined");
            return Ok(Decision::Allow);
        }

        let mut resolved = Vec::with_capacity(missing.len());
        for requirement in missing {
            let link = self.join_link(&requirement).await;
            resolved.push(MissingChannel { requirement, link });
        }
        debug!(user, %scope, missing = resolved.len(), "required channels missing");
        Ok(Decision::Deny(resolved))
    }

    /// Title and URL for a join button: public handle first, then a stored
    /// invite link, then a freshly exported one.
    async fn join_link(&self, requirement: &ChannelRequirement) -> Option<JoinLink> {
        let mut title = requirement.title.clone();
        let mut handle = requirement.handle.clone();
        if let ChannelRef::Handle(h) = &requirement.channel {
            handle.get_or_insert_with(|| h.clone());
        }

        if title.is_none() {
            match self.platform.resolve_entity(&requirement.channel).await {
                Ok(info) => {
                    title = Some(info.title);
                    handle = handle.or(info.handle);
                },
                Err(e) => {
                    warn!(channel = %requirement.channel, error = %e, "could not resolve channel for join prompt");
                    return None;
                },
            }
        }
        let title = title?;

        if let Some(handle) = handle {
            return Some(JoinLink {
                title,
                url: self.platform.public_url(&handle),
            });
        }
        if let Some(url) = requirement.invite_link.clone() {
            return Some(JoinLink { title, url });
        }

        let ChannelRef::Id(channel_id) = requirement.channel else {
            return None;
        };
        match self.platform.create_invite_link(channel_id).await {
            Ok(url) => Some(JoinLink { title, url }),
            Err(e) => {
                warn!(channel_id, error = %e, "could not create invite link");
                None
            },
        }
    }
}
