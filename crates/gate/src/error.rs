#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] joingate_store::Error),

    #[error(transparent)]
    Platform(#[from] joingate_channels::Error),

    /// Broadcast input that names neither or both of text and a source message.
    #[error("invalid broadcast content: {reason}")]
    InvalidContent { reason: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
