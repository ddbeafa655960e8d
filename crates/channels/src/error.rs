use std::error::Error as StdError;

/// Crate-wide result type for platform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed platform errors, normalized from whatever the adapter's client
/// library reports.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The chat, channel, user, or message does not exist or is not visible
    /// to the bot.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The bot lacks the rights for this operation, or the recipient blocked
    /// the bot.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// The platform asked us to slow down.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Input payload or parameter is invalid.
    #[error("invalid platform input: {message}")]
    InvalidInput { message: String },

    /// Any other API-level rejection.
    #[error("platform api error: {message}")]
    Api { message: String },

    /// Wrapped source error from the transport (network, decoding).
    #[error("platform request failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound {
            what: what.to_string(),
        }
    }

    #[must_use]
    pub fn forbidden(message: impl std::fmt::Display) -> Self {
        Self::Forbidden {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn api(message: impl std::fmt::Display) -> Self {
        Self::Api {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::External { .. })
    }
}
