//! Routes inbound events to listeners behind the gate.

use std::sync::Arc;

use {
    async_trait::async_trait,
    joingate_channels::{CallbackEvent, InboundEvent, MembershipEvent, MessagingPlatform},
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    middleware::{EventContext, EventGate},
};

/// Something that reacts to inbound events.
///
/// Message handlers only run for events the gate admits.
#[async_trait]
pub trait Listener: Send + Sync {
    fn name(&self) -> &str;

    async fn on_message(&self, ctx: &EventContext) -> Result<()>;

    /// Handle a button press. Return `true` if the payload was recognized.
    async fn on_callback(&self, _callback: &CallbackEvent) -> Result<bool> {
        Ok(false)
    }

    async fn on_membership(&self, _event: &MembershipEvent) -> Result<()> {
        Ok(())
    }
}

pub struct Dispatcher {
    gate: Arc<EventGate>,
    platform: Arc<dyn MessagingPlatform>,
    listeners: Vec<Arc<dyn Listener>>,
}

impl Dispatcher {
    pub fn new(gate: Arc<EventGate>, platform: Arc<dyn MessagingPlatform>) -> Self {
        Self {
            gate,
            platform,
            listeners: Vec::new(),
        }
    }

    pub fn register(&mut self, listener: Arc<dyn Listener>) {
        info!(listener = listener.name(), "listener registered");
        self.listeners.push(listener);
    }

    pub fn gate(&self) -> &Arc<EventGate> {
        &self.gate
    }

    pub async fn dispatch(&self, event: InboundEvent) {
        match event {
            InboundEvent::Message(message) => {
                self.dispatch_message(&EventContext::new(message)).await;
            },
            InboundEvent::Callback(callback) => self.dispatch_callback(&callback).await,
            InboundEvent::Membership(membership) => {
                for listener in &self.listeners {
                    if let Err(e) = listener.on_membership(&membership).await {
                        warn!(
                            listener = listener.name(),
                            chat_id = membership.chat_id,
                            error = %e,
                            "membership handler failed"
                        );
                    }
                }
            },
        }
    }

    /// Run every listener concurrently; each one waits on the shared gate
    /// decision first.
    pub async fn dispatch_message(&self, ctx: &EventContext) {
        let futures = self.listeners.iter().map(|listener| async move {
            if !self.gate.admit(ctx).await.is_admitted() {
                return;
            }
            if let Err(e) = listener.on_message(ctx).await {
                warn!(
                    listener = listener.name(),
                    chat_id = ctx.event.chat_id(),
                    error = %e,
                    "message handler failed"
                );
            }
        });
        futures::future::join_all(futures).await;
    }

    async fn dispatch_callback(&self, callback: &CallbackEvent) {
        for listener in &self.listeners {
            match listener.on_callback(callback).await {
                Ok(true) => return,
                Ok(false) => {},
                Err(e) => {
                    warn!(
                        listener = listener.name(),
                        callback = %callback.data,
                        error = %e,
                        "callback handler failed"
                    );
                    return;
                },
            }
        }
        debug!(callback = %callback.data, "unrecognized callback");
        if let Err(e) = self.platform.answer_callback(&callback.id, None, false).await {
            debug!(error = %e, "could not answer callback");
        }
    }
}
