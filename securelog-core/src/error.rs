use thiserror::Error;

pub type SecureLogResult<T> = Result<T, SecureLogError>;

#[derive(Error, Debug)]
pub enum SecureLogError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required property '{0}'")]
    MissingProperty(&'static str),

    #[error("Crypto operation failed: {0}")]
    Crypto(String),

    #[error("Malformed envelope: {0}")]
    Envelope(String),

    #[error("Unsupported envelope version: {0}")]
    EnvelopeVersion(u8),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
