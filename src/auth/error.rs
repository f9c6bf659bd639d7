//! Error types for the OAuth PKCE flow.

use thiserror::Error;

/// Errors raised while authorizing against OpenRouter.
///
/// None of these are retried. `StateMismatch` and `ExchangeFailed` abandon
/// the current authorization attempt; the user has to start over.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Secure random number generator is unavailable: {0}")]
    CryptoUnavailable(String),

    #[error("Invalid code verifier: {0}")]
    InvalidVerifier(String),

    #[error("callback_url is required to start the OAuth flow.")]
    MissingCallbackUrl,

    #[error("code_challenge_method was provided without a matching code_challenge.")]
    InvalidChallengeConfiguration,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Authorization code is required.")]
    MissingCode,

    #[error("Code verifier is required.")]
    MissingVerifier,

    #[error("OAuth state mismatch detected.")]
    StateMismatch,

    #[error("{0}")]
    ExchangeFailed(String),

    #[error("OpenRouter did not return an API key.")]
    MissingKeyInResponse,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors from a persistent key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage file {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
