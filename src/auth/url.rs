//! Authorization URL construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::AuthError;

/// Default OpenRouter site, hosting the `auth` consent page.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai";

/// Default OpenRouter API root, hosting `auth/keys` and `chat/completions`.
pub const DEFAULT_API_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// PKCE challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    #[default]
    S256,
    #[serde(rename = "plain")]
    Plain,
}

impl CodeChallengeMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CodeChallengeMethod::S256 => "S256",
            CodeChallengeMethod::Plain => "plain",
        }
    }
}

impl fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeChallengeMethod {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S256" => Ok(CodeChallengeMethod::S256),
            "plain" => Ok(CodeChallengeMethod::Plain),
            other => Err(AuthError::InvalidParameter(format!(
                "unknown code_challenge_method '{other}'"
            ))),
        }
    }
}

/// Inputs for [`create_authorization_url`].
#[derive(Debug, Clone, Default)]
pub struct AuthorizationUrlOptions {
    /// Where the provider redirects after consent. Required.
    pub callback_url: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<CodeChallengeMethod>,
    /// Optional spending limit attached to the created key.
    pub limit: Option<u64>,
    pub state: Option<String>,
    /// Overrides [`DEFAULT_BASE_URL`].
    pub base_url: Option<String>,
}

impl AuthorizationUrlOptions {
    pub fn new(callback_url: impl Into<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
            ..Self::default()
        }
    }
}

/// Build the provider's authorization URL. No network I/O.
pub fn create_authorization_url(options: &AuthorizationUrlOptions) -> Result<String, AuthError> {
    if options.callback_url.trim().is_empty() {
        return Err(AuthError::MissingCallbackUrl);
    }

    let challenge = options
        .code_challenge
        .as_deref()
        .filter(|c| !c.is_empty());
    if options.code_challenge_method.is_some() && challenge.is_none() {
        return Err(AuthError::InvalidChallengeConfiguration);
    }

    let base = resolve_base_url(options.base_url.as_deref(), DEFAULT_BASE_URL)?;
    let mut url = join_path(&base, "auth")?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("callback_url", &options.callback_url);

        if let Some(limit) = options.limit {
            query.append_pair("limit", &limit.to_string());
        }

        if let Some(state) = options.state.as_deref().filter(|s| !s.is_empty()) {
            query.append_pair("state", state);
        }

        if let Some(challenge) = challenge {
            let method = options.code_challenge_method.unwrap_or_default();
            query.append_pair("code_challenge", challenge);
            query.append_pair("code_challenge_method", method.as_str());
        }
    }

    Ok(url.to_string())
}

/// Parse `value`, or `fallback` when no override is given.
pub(crate) fn resolve_base_url(value: Option<&str>, fallback: &str) -> Result<Url, AuthError> {
    let raw = value.filter(|v| !v.trim().is_empty()).unwrap_or(fallback);
    Url::parse(raw).map_err(|e| AuthError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Append `path` below `base`, treating `base` as a directory.
pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url, AuthError> {
    let mut normalized = base.clone();
    if !normalized.path().ends_with('/') {
        let with_slash = format!("{}/", normalized.path());
        normalized.set_path(&with_slash);
    }

    normalized
        .join(path.trim_start_matches('/'))
        .map_err(|e| AuthError::InvalidUrl {
            url: format!("{normalized}{path}"),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn param(url: &str, name: &str) -> Option<String> {
        query(url).into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    #[test]
    fn test_auth_url_without_challenge() {
        let url =
            create_authorization_url(&AuthorizationUrlOptions::new("http://localhost:3000/cb"))
                .unwrap();

        assert!(url.starts_with("https://openrouter.ai/auth?"));
        assert_eq!(
            param(&url, "callback_url").as_deref(),
            Some("http://localhost:3000/cb")
        );
        assert!(param(&url, "code_challenge").is_none());
        assert!(param(&url, "code_challenge_method").is_none());
        assert!(param(&url, "state").is_none());
        assert!(param(&url, "limit").is_none());
    }

    #[test]
    fn test_auth_url_defaults_method_to_s256() {
        let options = AuthorizationUrlOptions {
            code_challenge: Some("challenge123".to_string()),
            ..AuthorizationUrlOptions::new("http://localhost:3000/cb")
        };
        let url = create_authorization_url(&options).unwrap();

        assert_eq!(param(&url, "code_challenge").as_deref(), Some("challenge123"));
        assert_eq!(param(&url, "code_challenge_method").as_deref(), Some("S256"));
    }

    #[test]
    fn test_auth_url_explicit_plain_method() {
        let options = AuthorizationUrlOptions {
            code_challenge: Some("challenge123".to_string()),
            code_challenge_method: Some(CodeChallengeMethod::Plain),
            ..AuthorizationUrlOptions::new("http://localhost:3000/cb")
        };
        let url = create_authorization_url(&options).unwrap();
        assert_eq!(param(&url, "code_challenge_method").as_deref(), Some("plain"));
    }

    #[test]
    fn test_auth_url_method_without_challenge_fails() {
        let options = AuthorizationUrlOptions {
            code_challenge_method: Some(CodeChallengeMethod::S256),
            ..AuthorizationUrlOptions::new("http://localhost:3000/cb")
        };
        assert!(matches!(
            create_authorization_url(&options),
            Err(AuthError::InvalidChallengeConfiguration)
        ));
    }

    #[test]
    fn test_auth_url_requires_callback() {
        assert!(matches!(
            create_authorization_url(&AuthorizationUrlOptions::new("  ")),
            Err(AuthError::MissingCallbackUrl)
        ));
    }

    #[test]
    fn test_auth_url_parameter_order_and_limit() {
        let options = AuthorizationUrlOptions {
            code_challenge: Some("c".to_string()),
            state: Some("s".to_string()),
            limit: Some(25),
            ..AuthorizationUrlOptions::new("http://localhost:3000/cb")
        };
        let url = create_authorization_url(&options).unwrap();
        let names: Vec<String> = query(&url).into_iter().map(|(k, _)| k).collect();

        assert_eq!(
            names,
            vec![
                "callback_url",
                "limit",
                "state",
                "code_challenge",
                "code_challenge_method"
            ]
        );
        assert_eq!(param(&url, "limit").as_deref(), Some("25"));
    }

    #[test]
    fn test_auth_url_base_override_is_normalized() {
        let options = AuthorizationUrlOptions {
            base_url: Some("https://example.test/router".to_string()),
            ..AuthorizationUrlOptions::new("http://localhost:3000/cb")
        };
        let url = create_authorization_url(&options).unwrap();
        assert!(url.starts_with("https://example.test/router/auth?"));
    }

    #[test]
    fn test_auth_url_rejects_bad_base() {
        let options = AuthorizationUrlOptions {
            base_url: Some("not a url".to_string()),
            ..AuthorizationUrlOptions::new("http://localhost:3000/cb")
        };
        assert!(matches!(
            create_authorization_url(&options),
            Err(AuthError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_join_path_keeps_base_path() {
        let base = Url::parse("https://openrouter.ai/api/v1").unwrap();
        assert_eq!(
            join_path(&base, "auth/keys").unwrap().as_str(),
            "https://openrouter.ai/api/v1/auth/keys"
        );

        let base = Url::parse("https://openrouter.ai/api/v1/").unwrap();
        assert_eq!(
            join_path(&base, "/chat/completions").unwrap().as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_challenge_method_parse() {
        assert_eq!(
            "S256".parse::<CodeChallengeMethod>().unwrap(),
            CodeChallengeMethod::S256
        );
        assert_eq!(
            "plain".parse::<CodeChallengeMethod>().unwrap(),
            CodeChallengeMethod::Plain
        );
        assert!("s256".parse::<CodeChallengeMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&CodeChallengeMethod::Plain).unwrap(),
            "\"plain\""
        );
    }
}
