//! Fan-out delivery to every known group and user.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use {
    governor::{DefaultDirectRateLimiter, Quota, RateLimiter},
    joingate_channels::{MessageRef, MessagingPlatform, OutgoingMessage},
    joingate_store::SubscriptionStore,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{Error, Result, prompt};

/// What to deliver: new text, or an existing message to forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastContent {
    Text(String),
    Forward(MessageRef),
}

impl BroadcastContent {
    /// Exactly one of `text` and `forward` must be given.
    pub fn from_parts(text: Option<String>, forward: Option<MessageRef>) -> Result<Self> {
        let text = text.filter(|t| !t.trim().is_empty());
        match (text, forward) {
            (Some(text), None) => Ok(Self::Text(text)),
            (None, Some(source)) => Ok(Self::Forward(source)),
            (None, None) => Err(Error::InvalidContent {
                reason: "no text and no message to forward",
            }),
            (Some(_), Some(_)) => Err(Error::InvalidContent {
                reason: "both text and a message to forward",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub groups_sent: u64,
    pub users_sent: u64,
    pub pinned: u64,
    pub failed: u64,
    /// Stopped before every recipient was attempted.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recipient {
    Group(i64),
    User(i64),
}

impl Recipient {
    fn chat_id(self) -> i64 {
        match self {
            Self::Group(id) | Self::User(id) => id,
        }
    }
}

pub struct Broadcaster {
    platform: Arc<dyn MessagingPlatform>,
    store: Arc<dyn SubscriptionStore>,
    delay: Duration,
}

impl Broadcaster {
    /// `delay` is the minimum spacing between two delivery attempts; zero
    /// disables pacing.
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        store: Arc<dyn SubscriptionStore>,
        delay: Duration,
    ) -> Self {
        Self {
            platform,
            store,
            delay,
        }
    }

    fn limiter(&self) -> Option<DefaultDirectRateLimiter> {
        Quota::with_period(self.delay)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)))
    }

    /// Deliver `content` to all groups, then all users.
    ///
    /// Fails only if the recipient lists cannot be read. Per-recipient
    /// failures are counted and logged.
    pub async fn run(
        &self,
        content: &BroadcastContent,
        cancel: &CancellationToken,
    ) -> Result<BroadcastSummary> {
        let groups = self.store.list_groups().await?;
        let users = self.store.list_users().await?;
        let recipients: Vec<Recipient> = groups
            .into_iter()
            .map(Recipient::Group)
            .chain(users.into_iter().map(Recipient::User))
            .collect();
        info!(recipients = recipients.len(), "broadcast started");

        let limiter = self.limiter();
        let mut summary = BroadcastSummary::default();
        for recipient in recipients {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if let Some(limiter) = &limiter {
                tokio::select! {
                    () = cancel.cancelled() => {
                        summary.cancelled = true;
                        break;
                    },
                    () = limiter.until_ready() => {},
                }
            }
            self.deliver(recipient, content, &mut summary).await;
        }

        info!(
            groups = summary.groups_sent,
            users = summary.users_sent,
            pinned = summary.pinned,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "broadcast finished"
        );
        Ok(summary)
    }

    async fn deliver(
        &self,
        recipient: Recipient,
        content: &BroadcastContent,
        summary: &mut BroadcastSummary,
    ) {
        let chat_id = recipient.chat_id();
        let sent = match content {
            BroadcastContent::Text(text) => {
                self.platform
                    .send_message(chat_id, &OutgoingMessage::text(text))
                    .await
            },
            BroadcastContent::Forward(source) => {
                self.platform.forward_message(chat_id, *source).await
            },
        };
        let message = match sent {
            Ok(message) => message,
            Err(e) => {
                summary.failed += 1;
                warn!(chat_id, error = %e, "broadcast delivery failed");
                return;
            },
        };

        match recipient {
            Recipient::User(_) => summary.users_sent += 1,
            Recipient::Group(_) => {
                summary.groups_sent += 1;
                match self.platform.pin_message(message, true).await {
                    Ok(()) => summary.pinned += 1,
                    Err(e) => debug!(chat_id, error = %e, "broadcast pin failed"),
                }
            },
        }
    }

    /// Run a broadcast and keep the operator informed in `report_chat`: one
    /// "in progress" message, edited once with the final counters.
    pub async fn broadcast_with_report(
        &self,
        report_chat: i64,
        content: &BroadcastContent,
        cancel: &CancellationToken,
    ) -> Result<BroadcastSummary> {
        let status = self
            .platform
            .send_message(report_chat, &OutgoingMessage::text("Broadcast in progress..."))
            .await;
        if let Err(e) = &status {
            warn!(chat_id = report_chat, error = %e, "could not post broadcast status");
        }

        let summary = self.run(content, cancel).await?;

        let report = OutgoingMessage::text(prompt::broadcast_report(&summary));
        let result = match status {
            Ok(status) => self.platform.edit_message(status, &report).await,
            Err(_) => self.platform.send_message(report_chat, &report).await.map(|_| ()),
        };
        if let Err(e) = result {
            warn!(chat_id = report_chat, error = %e, "could not post broadcast report");
        }
        Ok(summary)
    }
}
