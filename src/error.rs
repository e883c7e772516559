//! Request-level errors

use crate::builder::BuildError;
use thiserror::Error;

/// Why a token request was refused.
///
/// Everything except [`TokenError::Build`] is detected before the builder is
/// invoked.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("failed to parse expiry '{0}': expected seconds as an unsigned 32-bit integer")]
    InvalidExpiry(String),

    #[error("invalid user ID: {0}")]
    InvalidSubject(String),

    #[error("missing {0}")]
    MissingSubject(&'static str),

    #[error("missing channel name")]
    MissingChannel,

    #[error("unsupported token type: '{0}'")]
    UnsupportedTokenType(String),

    #[error("error generating {kind} token: {source}")]
    Build {
        kind: &'static str,
        #[source]
        source: BuildError,
    },
}

impl TokenError {
    /// True when the request itself was malformed, as opposed to the builder
    /// rejecting otherwise valid input
    pub fn is_validation(&self) -> bool {
        !matches!(self, TokenError::Build { .. })
    }
}

pub type Result<T> = std::result::Result<T, TokenError>;
