//! OpenRouter sign-in via OAuth 2.0 with PKCE.
//!
//! This module provides the PKCE primitives, the authorization URL builder,
//! the code exchange client, the loopback callback receiver, client-side
//! storage for the resulting API key, and the connection state machine that
//! ties them together.

mod callback;
mod error;
mod exchange;
mod flow;
mod pkce;
mod storage;
mod url;

pub use callback::{CallbackParams, CallbackServer};
pub use error::{AuthError, StorageError};
pub use exchange::{
    exchange_authorization_code, CodeExchanger, ExchangeOptions, ExchangeResponse,
    OpenRouterExchanger,
};
pub use flow::{transition, ConnectionState, FailureReason, FlowEvent, OAuthFlow};
pub use pkce::{
    create_sha256_code_challenge, generate_code_verifier, generate_oauth_state,
    validate_code_verifier, PkceChallenge, CODE_VERIFIER_MAX_LENGTH, CODE_VERIFIER_MIN_LENGTH,
    DEFAULT_STATE_BYTE_LENGTH, DEFAULT_VERIFIER_BYTE_LENGTH,
};
pub use storage::{
    FileStore, KeyValueStore, MemoryStore, API_KEY_STORAGE_KEY, CODE_VERIFIER_STORAGE_KEY,
    STATE_STORAGE_KEY,
};
pub use url::{
    create_authorization_url, AuthorizationUrlOptions, CodeChallengeMethod, DEFAULT_API_BASE_URL,
    DEFAULT_BASE_URL,
};

/// Mask an API key for display, keeping a short prefix and suffix.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let prefix: String = chars[..6].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", prefix, suffix)
}
