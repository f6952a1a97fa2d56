//! Error taxonomy for the push pipeline.
//!
//! Every failure surfaces as a [`PushError`] whose [`ErrorKind`] tells the
//! caller whether to fix its input, alert on a cryptographic failure, or
//! consider an external retry. Messages never carry key material.

use thiserror::Error;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input (keys, lengths, URLs). Never retried.
    Input,
    /// Key agreement, AEAD or signature failure. Fatal to the send attempt.
    Crypto,
    /// Push service rejected the message or was unreachable.
    Upstream,
}

/// Errors produced by the push pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// Caller supplied malformed or out-of-range input.
    #[error("Invalid input: {0}")]
    Input(String),
    /// A public key is not a valid P-256 point.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    /// A cryptographic primitive failed.
    #[error("Crypto failure: {0}")]
    Crypto(String),
    /// The push service could not be reached.
    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl PushError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(_) => ErrorKind::Input,
            Self::InvalidKey(_) | Self::Crypto(_) => ErrorKind::Crypto,
            Self::Upstream(_) => ErrorKind::Upstream,
        }
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub(crate) fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }
}

/// Result alias for the push pipeline.
pub type PushResult<T> = std::result::Result<T, PushError>;
