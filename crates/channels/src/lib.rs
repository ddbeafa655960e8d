//! Messaging platform abstraction.
//!
//! The gate and broadcast engines only talk to a chat platform through the
//! [`MessagingPlatform`] trait and consume platform updates as
//! [`InboundEvent`]s. Concrete adapters (Telegram) live in their own crates.

pub mod error;
pub mod event;
pub mod keyboard;
pub mod platform;

pub use {
    error::{Error, Result},
    event::{
        CallbackEvent, InboundEvent, MembershipChange, MembershipEvent, MessageEvent, Sender,
    },
    keyboard::{Button, Keyboard},
    platform::{
        AdminRank, ChannelInfo, MemberStatus, MessageRef, MessagingPlatform, OutgoingMessage,
    },
};
