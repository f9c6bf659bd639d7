//! PKCE (Proof Key for Code Exchange, RFC 7636) primitives.
//!
//! The verifier is sent only during the final token exchange; the challenge
//! (its SHA-256 digest) goes out with the authorization redirect.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::AuthError;

/// Shortest verifier RFC 7636 allows.
pub const CODE_VERIFIER_MIN_LENGTH: usize = 43;
/// Longest verifier RFC 7636 allows.
pub const CODE_VERIFIER_MAX_LENGTH: usize = 128;

/// Default number of random bytes behind a verifier (43 characters).
pub const DEFAULT_VERIFIER_BYTE_LENGTH: usize = 32;
/// Default number of random bytes behind a state token.
pub const DEFAULT_STATE_BYTE_LENGTH: usize = 16;

const MIN_VERIFIER_BYTES: usize = 32;
const MAX_VERIFIER_BYTES: usize = 96;

/// PKCE verifier and challenge pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    /// Random secret, kept locally until the code exchange.
    pub code_verifier: String,
    /// base64url(sha256(code_verifier)).
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh pair with a default-length verifier.
    pub fn generate() -> Result<Self, AuthError> {
        create_sha256_code_challenge(None)
    }
}

/// Generate a random code verifier from `byte_length` random bytes.
///
/// `byte_length` must lie in `[32, 96]` so the encoded verifier is between
/// 43 and 128 characters.
pub fn generate_code_verifier(byte_length: usize) -> Result<String, AuthError> {
    if !(MIN_VERIFIER_BYTES..=MAX_VERIFIER_BYTES).contains(&byte_length) {
        return Err(AuthError::InvalidParameter(format!(
            "byte length {byte_length} must produce a code verifier between \
             {CODE_VERIFIER_MIN_LENGTH} and {CODE_VERIFIER_MAX_LENGTH} characters"
        )));
    }

    let verifier = random_base64url(byte_length)?;
    validate_code_verifier(&verifier)?;
    Ok(verifier)
}

/// Create an S256 challenge for `verifier`, generating one when `None`.
pub fn create_sha256_code_challenge(verifier: Option<&str>) -> Result<PkceChallenge, AuthError> {
    let code_verifier = match verifier {
        Some(v) => v.to_string(),
        None => generate_code_verifier(DEFAULT_VERIFIER_BYTE_LENGTH)?,
    };
    validate_code_verifier(&code_verifier)?;

    let code_challenge = compute_challenge(&code_verifier);
    Ok(PkceChallenge {
        code_verifier,
        code_challenge,
    })
}

/// Generate an opaque state token for CSRF protection.
pub fn generate_oauth_state(byte_length: usize) -> Result<String, AuthError> {
    if byte_length == 0 {
        return Err(AuthError::InvalidParameter(
            "byte length must be a positive integer".to_string(),
        ));
    }
    random_base64url(byte_length)
}

/// Check a verifier against the RFC 7636 length and charset rules.
pub fn validate_code_verifier(verifier: &str) -> Result<(), AuthError> {
    let len = verifier.len();
    if !(CODE_VERIFIER_MIN_LENGTH..=CODE_VERIFIER_MAX_LENGTH).contains(&len) {
        return Err(AuthError::InvalidVerifier(format!(
            "must be between {CODE_VERIFIER_MIN_LENGTH} and {CODE_VERIFIER_MAX_LENGTH} \
             characters, got {len}"
        )));
    }

    if !verifier.chars().all(is_unreserved) {
        return Err(AuthError::InvalidVerifier(
            "must only contain unreserved characters: [A-Za-z0-9-._~]".to_string(),
        ));
    }

    Ok(())
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

fn random_base64url(byte_length: usize) -> Result<String, AuthError> {
    let mut bytes = vec![0u8; byte_length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::CryptoUnavailable(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// base64url(sha256(verifier))
fn compute_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
