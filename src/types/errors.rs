use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a generation round is already active for session {0}")]
    Busy(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("history storage error: {0}")]
    History(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] ImageError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine fault: {0}")]
    Fault(String),

    #[error("invalid conversation: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image payload is not a data URL")]
    MissingHeader,

    #[error("image payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// The client side of a round went away while tokens were being forwarded
#[derive(Debug, Error)]
#[error("client stream closed")]
pub struct StreamBreak;
