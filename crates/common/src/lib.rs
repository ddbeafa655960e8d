//! Shared identifiers, channel references, and the error helpers used across
//! all joingate crates.

pub mod error;
pub mod types;

pub use error::{Error, Result};
