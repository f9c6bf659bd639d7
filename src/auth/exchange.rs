//! Authorization code exchange (the last PKCE step).
//!
//! OpenRouter trades the authorization code plus the original verifier for
//! a long-lived API key at `POST {api_base}/auth/keys`.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::url::{join_path, resolve_base_url, CodeChallengeMethod, DEFAULT_API_BASE_URL};
use super::AuthError;

/// Inputs for [`exchange_authorization_code`].
#[derive(Debug, Clone)]
pub struct ExchangeOptions {
    pub code: String,
    pub code_verifier: String,
    pub code_challenge_method: CodeChallengeMethod,
    /// Overrides [`DEFAULT_API_BASE_URL`].
    pub api_base_url: Option<String>,
}

impl ExchangeOptions {
    pub fn new(code: impl Into<String>, code_verifier: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            code_verifier: code_verifier.into(),
            code_challenge_method: CodeChallengeMethod::S256,
            api_base_url: None,
        }
    }
}

/// Successful exchange result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResponse {
    pub key: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
    code_verifier: &'a str,
    code_challenge_method: CodeChallengeMethod,
}

/// Response body, either `{key, user_id?}` or `{error: {message}}`.
#[derive(Debug, Default, Deserialize)]
struct ExchangePayload {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    error: Option<ExchangeErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ExchangeErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Exchange an authorization code for an API key.
pub async fn exchange_authorization_code(
    client: &Client,
    options: &ExchangeOptions,
) -> Result<ExchangeResponse, AuthError> {
    if options.code.trim().is_empty() {
        return Err(AuthError::MissingCode);
    }
    if options.code_verifier.trim().is_empty() {
        return Err(AuthError::MissingVerifier);
    }

    let base = resolve_base_url(options.api_base_url.as_deref(), DEFAULT_API_BASE_URL)?;
    let url = join_path(&base, "auth/keys")?;

    let body = ExchangeRequest {
        code: &options.code,
        code_verifier: &options.code_verifier,
        code_challenge_method: options.code_challenge_method,
    };

    tracing::debug!(%url, "exchanging authorization code");

    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .header(CACHE_CONTROL, "no-store")
        .json(&body)
        .send()
        .await
        .map_err(|e| AuthError::ExchangeFailed(format!("Failed to exchange authorization code: {e}")))?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AuthError::ExchangeFailed(format!("Failed to exchange authorization code: {e}")))?;

    let payload: ExchangePayload = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        tracing::debug!("exchange response is not JSON ({e}), treating as empty");
        ExchangePayload::default()
    });

    if !status.is_success() {
        let message = payload
            .error
            .and_then(|err| err.message)
            .unwrap_or_else(|| {
                format!(
                    "Failed to exchange authorization code (status {}).",
                    status.as_u16()
                )
            });
        tracing::warn!(status = status.as_u16(), "authorization code exchange rejected");
        return Err(AuthError::ExchangeFailed(message));
    }

    match payload.key.filter(|k| !k.is_empty()) {
        Some(key) => Ok(ExchangeResponse {
            key,
            user_id: payload.user_id,
        }),
        None => Err(AuthError::MissingKeyInResponse),
    }
}

/// Something that can turn an authorization code into an API key.
///
/// The connection flow depends on this rather than on HTTP directly.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    async fn exchange(
        &self,
        code: &str,
        code_verifier: &str,
        method: CodeChallengeMethod,
    ) -> Result<ExchangeResponse, AuthError>;
}

/// [`CodeExchanger`] backed by the OpenRouter HTTP endpoint.
#[derive(Debug, Clone)]
pub struct OpenRouterExchanger {
    client: Client,
    api_base_url: Option<String>,
}

impl OpenRouterExchanger {
    pub fn new(api_base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base_url,
        }
    }
}

#[async_trait]
impl CodeExchanger for OpenRouterExchanger {
    async fn exchange(
        &self,
        code: &str,
        code_verifier: &str,
        method: CodeChallengeMethod,
    ) -> Result<ExchangeResponse, AuthError> {
        let options = ExchangeOptions {
            code_challenge_method: method,
            api_base_url: self.api_base_url.clone(),
            ..ExchangeOptions::new(code, code_verifier)
        };
        exchange_authorization_code(&self.client, &options).await
    }
}
