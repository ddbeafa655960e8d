//! Per-event enforcement.
//!
//! Each inbound message is wrapped in an [`EventContext`]. Every listener
//! attached to the event asks [`EventGate::admit`] before doing anything; the
//! first caller evaluates both scopes and performs the side effects (prompt,
//! deletion, registration), concurrent and later callers receive the same
//! stored decision.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use {
    joingate_channels::{MessageEvent, MessagingPlatform, OutgoingMessage, Sender},
    joingate_common::types::GroupId,
    joingate_config::GlobalScopeMode,
    joingate_store::SubscriptionStore,
    tokio::sync::OnceCell,
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    authz::Authorizer,
    commands::{self, Command},
    policy::{Decision, EnforcementPolicy, MissingChannel, Scope},
    prompt,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Both scopes passed.
    Allow,
    /// Configuration command from a group admin; membership was not checked.
    Bypass,
    Deny {
        scope: Scope,
        missing: Vec<MissingChannel>,
    },
    /// Sender is banned (private chats only).
    Banned,
    /// The registry failed; the user was asked to retry.
    Unavailable,
}

impl GateDecision {
    /// Whether downstream listeners may handle the event.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Allow | Self::Bypass)
    }
}

/// One inbound message and its evaluation marker.
pub struct EventContext {
    pub event: MessageEvent,
    decision: OnceCell<GateDecision>,
}

impl EventContext {
    pub fn new(event: MessageEvent) -> Self {
        Self {
            event,
            decision: OnceCell::new(),
        }
    }

    /// The decision, if evaluation already finished.
    pub fn decision(&self) -> Option<&GateDecision> {
        self.decision.get()
    }

    /// The parsed command, if the message is one.
    pub fn command(&self) -> Option<Command<'_>> {
        self.event.text.as_deref().and_then(commands::parse_command)
    }
}

pub struct EventGate {
    policy: Arc<EnforcementPolicy>,
    store: Arc<dyn SubscriptionStore>,
    platform: Arc<dyn MessagingPlatform>,
    authz: Authorizer,
    global_scope: GlobalScopeMode,
    log_chat_id: Option<i64>,
    evaluations: AtomicU64,
}

impl EventGate {
    pub fn new(
        policy: Arc<EnforcementPolicy>,
        store: Arc<dyn SubscriptionStore>,
        platform: Arc<dyn MessagingPlatform>,
        authz: Authorizer,
    ) -> Self {
        Self {
            policy,
            store,
            platform,
            authz,
            global_scope: GlobalScopeMode::default(),
            log_chat_id: None,
            evaluations: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_global_scope(mut self, mode: GlobalScopeMode) -> Self {
        self.global_scope = mode;
        self
    }

    #[must_use]
    pub fn with_log_chat(mut self, chat_id: Option<i64>) -> Self {
        self.log_chat_id = chat_id;
        self
    }

    #[cfg(test)]
    pub(crate) fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Evaluate the event at most once and return the shared decision.
    pub async fn admit<'a>(&self, ctx: &'a EventContext) -> &'a GateDecision {
        ctx.decision
            .get_or_init(|| self.evaluate_event(&ctx.event))
            .await
    }

    async fn evaluate_event(&self, event: &MessageEvent) -> GateDecision {
        let evaluation = self.evaluations.fetch_add(1, Ordering::Relaxed) + 1;
        let decision = match self.decide(event).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    chat_id = event.chat_id(),
                    user = event.sender.id,
                    error = %e,
                    "gate evaluation failed"
                );
                GateDecision::Unavailable
            },
        };
        debug!(
            chat_id = event.chat_id(),
            user = event.sender.id,
            evaluation,
            ?decision,
            "gate decision"
        );
        self.apply(event, &decision).await;
        decision
    }

    async fn decide(&self, event: &MessageEvent) -> Result<GateDecision> {
        let user = event.sender.id;
        if event.is_private() && self.store.is_banned(user).await? {
            return Ok(GateDecision::Banned);
        }

        // Only the acting admin skips membership; everyone else's config
        // commands are gated like any other message.
        let command = event.text.as_deref().and_then(commands::parse_command);
        if let Some(group) = event.group_id()
            && command.as_ref().is_some_and(Command::is_config)
            && self.authz.is_authorized(group, user).await
        {
            return Ok(GateDecision::Bypass);
        }

        let global_applies = match self.global_scope {
            GlobalScopeMode::All => true,
            GlobalScopeMode::Commands => command.is_some(),
        };
        if global_applies
            && let Decision::Deny(missing) = self.policy.evaluate(user, Scope::Global).await?
        {
            return Ok(GateDecision::Deny {
                scope: Scope::Global,
                missing,
            });
        }

        if let Some(group) = event.group_id()
            && let Decision::Deny(missing) = self.policy.evaluate(user, Scope::Group(group)).await?
        {
            return Ok(GateDecision::Deny {
                scope: Scope::Group(group),
                missing,
            });
        }

        Ok(GateDecision::Allow)
    }

    async fn apply(&self, event: &MessageEvent, decision: &GateDecision) {
        match decision {
            GateDecision::Allow | GateDecision::Bypass => self.register(event).await,
            GateDecision::Deny { scope, missing } => {
                let mut prompt = prompt::join_prompt(&event.sender, *scope, missing);
                if let Scope::Group(_) = scope {
                    if let Err(e) = self.platform.delete_message(event.message).await {
                        warn!(
                            chat_id = event.chat_id(),
                            message_id = event.message.message_id,
                            error = %e,
                            "could not delete gated message"
                        );
                    }
                } else {
                    prompt = prompt.in_reply_to(event.message.message_id);
                }
                self.reply(event.chat_id(), &prompt).await;
            },
            GateDecision::Banned => {
                self.reply(event.chat_id(), &OutgoingMessage::text(prompt::BANNED_TEXT))
                    .await;
            },
            GateDecision::Unavailable => {
                let msg = OutgoingMessage::text(prompt::UNAVAILABLE_TEXT)
                    .in_reply_to(event.message.message_id);
                self.reply(event.chat_id(), &msg).await;
            },
        }
    }

    /// Record the user (private chat) or group (group chat) and announce
    /// first sightings in the log chat.
    async fn register(&self, event: &MessageEvent) {
        if event.is_private() {
            match self.store.add_user(event.sender.id).await {
                Ok(true) => {
                    info!(user = event.sender.id, "new user");
                    self.notify_log(&format!("New user: {}", describe(&event.sender)))
                        .await;
                },
                Ok(false) => {},
                Err(e) => warn!(user = event.sender.id, error = %e, "could not register user"),
            }
        } else if let Some(group) = event.group_id() {
            self.register_group(group).await;
        }
    }

    pub(crate) async fn register_group(&self, group: GroupId) {
        match self.store.add_group(group).await {
            Ok(true) => {
                info!(group, "new group");
                self.notify_log(&format!("New group: {group}")).await;
            },
            Ok(false) => {},
            Err(e) => warn!(group, error = %e, "could not register group"),
        }
    }

    async fn notify_log(&self, text: &str) {
        let Some(chat_id) = self.log_chat_id else {
            return;
        };
        if let Err(e) = self
            .platform
            .send_message(chat_id, &OutgoingMessage::text(text))
            .await
        {
            warn!(chat_id, error = %e, "could not post to log chat");
        }
    }

    async fn reply(&self, chat_id: i64, message: &OutgoingMessage) {
        if let Err(e) = self.platform.send_message(chat_id, message).await {
            warn!(chat_id, error = %e, "could not send gate reply");
        }
    }

    /// Re-run the group scope for `user`, used by the confirm button under a
    /// group join prompt.
    pub async fn recheck_group(&self, user: &Sender, group: GroupId) -> Result<Decision> {
        self.policy.evaluate(user.id, Scope::Group(group)).await
    }
}

fn describe(sender: &Sender) -> String {
    match &sender.username {
        Some(username) => format!("{} (@{username}, {})", sender.display_name, sender.id),
        None => format!("{} ({})", sender.display_name, sender.id),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            testing::{MockPlatform, sender},
            verifier::MembershipVerifier,
        },
        joingate_channels::MessageRef,
        joingate_common::types::{ChannelRef, ChannelRequirement, ChatType},
        joingate_store::store_memory::InMemoryStore,
        std::time::Duration,
    };

    const OWNER: i64 = 1;
    const ADMIN: i64 = 2;
    const USER: i64 = 7;
    const GROUP: i64 = -500;
    const LOG_CHAT: i64 = -999;

    fn message(chat_type: ChatType, chat_id: i64, user: i64, text: &str) -> MessageEvent {
        MessageEvent {
            message: MessageRef {
                chat_id,
                message_id: 42,
            },
            chat_type,
            sender: sender(user),
            text: Some(text.into()),
            reply_to: None,
        }
    }

    fn gate(
        platform: Arc<MockPlatform>,
        store: Arc<InMemoryStore>,
        global: Vec<ChannelRef>,
    ) -> EventGate {
        let verifier = MembershipVerifier::new(platform.clone(), Duration::from_secs(5));
        let policy = EnforcementPolicy::new(platform.clone(), store.clone(), verifier, OWNER)
            .with_global_channels(global);
        let authz = Authorizer::new(platform.clone(), OWNER);
        EventGate::new(Arc::new(policy), store, platform, authz).with_log_chat(Some(LOG_CHAT))
    }

    fn platform() -> MockPlatform {
        MockPlatform::new()
            .with_channel(-1001, "Channel A", Some("channelA"))
            .with_channel(-1002, "Channel B", None)
            .with_admin(GROUP, ADMIN)
    }

    async fn group_config(store: &InMemoryStore) {
        store
            .set_channels(GROUP, vec![ChannelRequirement::bare(ChannelRef::Id(-1002))])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_denied_by_global_scope_is_not_registered() {
        let platform = Arc::new(platform());
        let store = Arc::new(InMemoryStore::new());
        let gate = gate(platform.clone(), store.clone(), vec![ChannelRef::Handle(
            "channelA".into(),
        )]);
        let ctx = EventContext::new(message(ChatType::Private, USER, USER, "/start"));

        let decision = gate.admit(&ctx).await;
        let GateDecision::Deny { scope, missing } = decision else {
            panic!("expected deny, got {decision:?}");
        };
        assert_eq!(*scope, Scope::Global);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].requirement.channel, ChannelRef::Handle("channelA".into()));

        let prompts = platform.sent_to(USER);
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].buttons.concat().len(), 1);
        assert_eq!(prompts[0].reply_to, Some(42));
        assert!(store.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_admits_evaluate_once() {
        let platform = Arc::new(platform());
        let store = Arc::new(InMemoryStore::new());
        let gate = gate(platform.clone(), store, vec![ChannelRef::Id(-1001)]);
        let ctx = EventContext::new(message(ChatType::Private, USER, USER, "hello"));
        assert!(ctx.decision().is_none());

        let decisions = futures::future::join_all((0..8).map(|_| gate.admit(&ctx))).await;
        assert!(decisions.iter().all(|d| *d == decisions[0]));
        assert_eq!(gate.evaluations(), 1);
        assert_eq!(ctx.decision(), Some(decisions[0]));
        assert_eq!(
            platform
                .membership_calls
                .load(Ordering::SeqCst),
            1
        );
        assert_eq!(platform.sent_to(USER).len(), 1);
    }

    #[tokio::test]
    async fn allowed_private_message_registers_user_once() {
        let platform = Arc::new(platform().with_member(-1001, USER));
        let store = Arc::new(InMemoryStore::new());
        let gate = gate(platform.clone(), store.clone(), vec![ChannelRef::Id(-1001)]);

        for _ in 0..2 {
            let ctx = EventContext::new(message(ChatType::Private, USER, USER, "/start"));
            assert_eq!(*gate.admit(&ctx).await, GateDecision::Allow);
        }
        assert_eq!(store.list_users().await.unwrap(), vec![USER]);
        let notices = platform.sent_to(LOG_CHAT);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].text.starts_with("New user: User 7"));
    }

    #[tokio::test]
    async fn group_deny_deletes_message_and_offers_confirm() {
        let platform = Arc::new(platform());
        let store = Arc::new(InMemoryStore::new());
        group_config(&store).await;
        let gate = gate(platform.clone(), store.clone(), Vec::new());
        let ctx = EventContext::new(message(ChatType::Group, GROUP, USER, "hi all"));

        assert!(matches!(
            gate.admit(&ctx).await,
            GateDecision::Deny {
                scope: Scope::Group(GROUP),
                ..
            }
        ));
        assert_eq!(*platform.deleted.lock().unwrap(), vec![ctx.event.message]);
        let prompt = &platform.sent_to(GROUP)[0];
        assert_eq!(prompt.reply_to, None);
        assert!(
            prompt
                .buttons
                .concat()
                .contains(&joingate_channels::Button::callback("I've joined", "confirm:-500"))
        );
        assert!(store.list_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_failure_is_swallowed() {
        let platform = Arc::new(platform().with_failing_deletes());
        let store = Arc::new(InMemoryStore::new());
        group_config(&store).await;
        let gate = gate(platform.clone(), store, Vec::new());
        let ctx = EventContext::new(message(ChatType::Group, GROUP, USER, "hi"));

        assert!(!gate.admit(&ctx).await.is_admitted());
        assert_eq!(platform.sent_to(GROUP).len(), 1);
    }

    #[tokio::test]
    async fn either_scope_denies() {
        let store = Arc::new(InMemoryStore::new());
        group_config(&store).await;

        // Global passes, group fails.
        let platform_a = Arc::new(platform().with_member(-1001, USER));
        let gate_a = gate(platform_a, store.clone(), vec![ChannelRef::Id(-1001)]);
        let ctx = EventContext::new(message(ChatType::Group, GROUP, USER, "hi"));
        assert!(matches!(
            gate_a.admit(&ctx).await,
            GateDecision::Deny {
                scope: Scope::Group(_),
                ..
            }
        ));

        // Global fails, group passes.
        let platform_b = Arc::new(platform().with_member(-1002, USER));
        let gate_b = gate(platform_b, store.clone(), vec![ChannelRef::Id(-1001)]);
        let ctx = EventContext::new(message(ChatType::Group, GROUP, USER, "hi"));
        assert!(matches!(
            gate_b.admit(&ctx).await,
            GateDecision::Deny {
                scope: Scope::Global,
                ..
            }
        ));

        // Both pass.
        let platform_c = Arc::new(
            platform()
                .with_member(-1001, USER)
                .with_member(-1002, USER),
        );
        let gate_c = gate(platform_c, store.clone(), vec![ChannelRef::Id(-1001)]);
        let ctx = EventContext::new(message(ChatType::Group, GROUP, USER, "hi"));
        assert_eq!(*gate_c.admit(&ctx).await, GateDecision::Allow);
        assert_eq!(store.list_groups().await.unwrap(), vec![GROUP]);
    }

    #[tokio::test]
    async fn admin_config_commands_bypass_membership() {
        let platform = Arc::new(platform());
        let store = Arc::new(InMemoryStore::new());
        group_config(&store).await;
        let gate = gate(platform.clone(), store, vec![ChannelRef::Id(-1001)]);

        for user in [ADMIN, OWNER] {
            for text in ["/set @x", "/fsub@joingate_bot off", "/reset"] {
                let ctx = EventContext::new(message(ChatType::Group, GROUP, user, text));
                assert_eq!(*gate.admit(&ctx).await, GateDecision::Bypass);
            }
        }
        assert_eq!(
            platform
                .membership_calls
                .load(Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn non_admin_config_command_is_gated() {
        let platform = Arc::new(platform());
        let store = Arc::new(InMemoryStore::new());
        group_config(&store).await;
        let gate = gate(platform.clone(), store.clone(), Vec::new());

        let ctx = EventContext::new(message(
            ChatType::Group,
            GROUP,
            USER,
            "/set buy cheap followers",
        ));
        assert!(matches!(
            gate.admit(&ctx).await,
            GateDecision::Deny {
                scope: Scope::Group(GROUP),
                ..
            }
        ));
        assert_eq!(*platform.deleted.lock().unwrap(), vec![ctx.event.message]);
        assert!(store.list_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn private_config_command_is_not_registered_without_membership() {
        let platform = Arc::new(platform());
        let store = Arc::new(InMemoryStore::new());
        let gate = gate(platform.clone(), store.clone(), vec![ChannelRef::Id(-1001)]);

        let ctx = EventContext::new(message(ChatType::Private, USER, USER, "/reset"));
        assert!(matches!(
            gate.admit(&ctx).await,
            GateDecision::Deny {
                scope: Scope::Global,
                ..
            }
        ));
        assert!(store.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn banned_user_in_private_chat() {
        let platform = Arc::new(platform());
        let store = Arc::new(InMemoryStore::new());
        store.ban_user(USER).await.unwrap();
        let gate = gate(platform.clone(), store, Vec::new());

        let ctx = EventContext::new(message(ChatType::Private, USER, USER, "/start"));
        assert_eq!(*gate.admit(&ctx).await, GateDecision::Banned);
        assert_eq!(platform.sent_to(USER)[0].text, prompt::BANNED_TEXT);

        let ctx = EventContext::new(message(ChatType::Group, GROUP, USER, "hi"));
        assert_eq!(*gate.admit(&ctx).await, GateDecision::Allow);
    }

    #[tokio::test]
    async fn commands_mode_leaves_plain_messages_alone() {
        let platform = Arc::new(platform());
        let store = Arc::new(InMemoryStore::new());
        let gate = gate(platform, store, vec![ChannelRef::Id(-1001)])
            .with_global_scope(GlobalScopeMode::Commands);

        let ctx = EventContext::new(message(ChatType::Private, USER, USER, "just chatting"));
        assert_eq!(*gate.admit(&ctx).await, GateDecision::Allow);
        let ctx = EventContext::new(message(ChatType::Private, USER, USER, "/help"));
        assert!(!gate.admit(&ctx).await.is_admitted());
    }

    #[tokio::test]
    async fn registry_failure_is_unavailable() {
        let platform = Arc::new(platform());
        let store = Arc::new(crate::testing::FailingStore);
        let verifier = MembershipVerifier::new(platform.clone(), Duration::from_secs(5));
        let policy = EnforcementPolicy::new(platform.clone(), store.clone(), verifier, OWNER);
        let authz = Authorizer::new(platform.clone(), OWNER);
        let gate = EventGate::new(Arc::new(policy), store, platform.clone(), authz);

        let ctx = EventContext::new(message(ChatType::Private, USER, USER, "/start"));
        assert_eq!(*gate.admit(&ctx).await, GateDecision::Unavailable);
        assert_eq!(platform.sent_to(USER)[0].text, prompt::UNAVAILABLE_TEXT);
    }

    #[tokio::test]
    async fn owner_passes_global_scope() {
        let platform = Arc::new(platform());
        let store = Arc::new(InMemoryStore::new());
        let gate = gate(platform, store, vec![ChannelRef::Id(-1001)]);
        let ctx = EventContext::new(message(ChatType::Private, OWNER, OWNER, "/stats"));
        assert_eq!(*gate.admit(&ctx).await, GateDecision::Allow);
    }
}
