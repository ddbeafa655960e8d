//! Access gating for chat bots.
//!
//! Before a message reaches the bot's handlers, the [`middleware::EventGate`]
//! checks that its sender belongs to the owner's global channels and to the
//! group's own channel list. Users who fail are shown a join prompt. The
//! crate also carries the admin command surface and the
//! [`broadcast::Broadcaster`] that fans a message out to every known chat.

pub mod authz;
pub mod broadcast;
pub mod callback;
pub mod commands;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod prompt;
pub mod verifier;

#[cfg(test)]
mod testing;

pub use {
    authz::Authorizer,
    broadcast::{BroadcastContent, BroadcastSummary, Broadcaster},
    commands::CommandRouter,
    dispatch::{Dispatcher, Listener},
    error::{Error, Result},
    middleware::{EventContext, EventGate, GateDecision},
    policy::{Decision, EnforcementPolicy, JoinLink, MissingChannel, Scope},
    verifier::{MembershipOutcome, MembershipVerifier},
};
