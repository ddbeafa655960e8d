//! Telegram adapter: a [`joingate_channels::MessagingPlatform`] backed by the
//! Bot API and a long-polling loop that feeds updates into the gate
//! dispatcher.

pub mod bot;
pub mod config;
pub mod error;
pub mod handlers;
pub mod platform;

pub use {
    bot::TelegramBot,
    config::TelegramAccountConfig,
    error::{Error, Result},
    platform::TelegramPlatform,
};
