use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid channel reference: {input:?}")]
    InvalidChannelRef { input: String },
}

impl Error {
    #[must_use]
    pub fn invalid_channel_ref(input: impl Into<String>) -> Self {
        Self::InvalidChannelRef {
            input: input.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
