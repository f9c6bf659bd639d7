//! Connection state machine and the PKCE flow that drives it.
//!
//! `initializing -> {disconnected, connecting, connected, error}`, and
//! `connecting -> {connected, error}`. Everything except `connecting` waits
//! for the user to act again.

use super::callback::CallbackParams;
use super::exchange::{CodeExchanger, ExchangeResponse};
use super::pkce::{
    create_sha256_code_challenge, generate_oauth_state, DEFAULT_STATE_BYTE_LENGTH,
};
use super::storage::{KeyValueStore, CODE_VERIFIER_STORAGE_KEY, STATE_STORAGE_KEY};
use super::url::{create_authorization_url, AuthorizationUrlOptions, CodeChallengeMethod};
use super::AuthError;

/// Why the flow ended up in [`ConnectionState::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    StateMismatch,
    MissingVerifier,
    ExchangeFailed(String),
    /// The provider redirected back with an `error` parameter.
    Provider(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StateMismatch => write!(f, "state_mismatch"),
            Self::MissingVerifier => write!(f, "missing_verifier"),
            Self::ExchangeFailed(msg) => write!(f, "exchange_failed: {}", msg),
            Self::Provider(err) => write!(f, "{}", err),
        }
    }
}

/// Where the user is in the connect flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Initializing,
    Disconnected,
    Connecting,
    Connected,
    Error(FailureReason),
}

impl ConnectionState {
    /// Get the display label for this state.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error(_) => "error",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Inputs to [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// A stored API key was found at startup.
    KeyFound,
    /// Startup without a key or callback parameters.
    NothingPending,
    /// Callback carried neither `code` nor `error`.
    MissingCode,
    /// Callback state matched the stored state.
    StateValidated,
    StateRejected,
    /// Callback carried only an `error`.
    ProviderError(String),
    VerifierMissing,
    ExchangeSucceeded,
    ExchangeFailed(String),
    /// User starts a new authorization attempt.
    Restart,
}

/// Pure transition function. Events that make no sense in the current state
/// leave it unchanged.
pub fn transition(state: &ConnectionState, event: &FlowEvent) -> ConnectionState {
    use ConnectionState as S;
    use FlowEvent as E;

    match (state, event) {
        (S::Initializing, E::KeyFound) => S::Connected,
        (S::Initializing, E::NothingPending) => S::Disconnected,
        (S::Initializing, E::MissingCode) => S::Disconnected,
        (S::Initializing, E::StateValidated) => S::Connecting,
        (S::Initializing, E::StateRejected) => S::Error(FailureReason::StateMismatch),
        (S::Initializing, E::ProviderError(err)) => S::Error(FailureReason::Provider(err.clone())),

        (S::Connecting, E::ExchangeSucceeded) => S::Connected,
        (S::Connecting, E::ExchangeFailed(msg)) => {
            S::Error(FailureReason::ExchangeFailed(msg.clone()))
        }
        (S::Connecting, E::VerifierMissing) => S::Error(FailureReason::MissingVerifier),

        (S::Connecting, E::Restart) => S::Connecting,
        (_, E::Restart) => S::Disconnected,

        (current, _) => current.clone(),
    }
}

/// Orchestrates one PKCE authorization attempt against a store and exchanger.
pub struct OAuthFlow<S, X> {
    store: S,
    exchanger: X,
    state: ConnectionState,
    pending_code: Option<String>,
    base_url: Option<String>,
    limit: Option<u64>,
}

impl<S: KeyValueStore, X: CodeExchanger> OAuthFlow<S, X> {
    pub fn new(store: S, exchanger: X) -> Self {
        Self {
            store,
            exchanger,
            state: ConnectionState::Initializing,
            pending_code: None,
            base_url: None,
            limit: None,
        }
    }

    /// Override the provider site used for the authorization URL.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Attach a spending limit to the key that will be created.
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn apply(&mut self, event: FlowEvent) {
        let next = transition(&self.state, &event);
        tracing::debug!(from = self.state.label(), to = next.label(), ?event, "connection state");
        self.state = next;
    }

    /// Start a new authorization attempt.
    ///
    /// Generates and stores a fresh verifier and state (overwriting any
    /// previous attempt) and returns the URL to send the user to.
    pub fn begin(&mut self, callback_url: &str) -> Result<String, AuthError> {
        self.apply(FlowEvent::Restart);
        self.pending_code = None;

        let challenge = create_sha256_code_challenge(None)?;
        let state = generate_oauth_state(DEFAULT_STATE_BYTE_LENGTH)?;

        self.store
            .set(CODE_VERIFIER_STORAGE_KEY, &challenge.code_verifier)?;
        self.store.set(STATE_STORAGE_KEY, &state)?;

        create_authorization_url(&AuthorizationUrlOptions {
            callback_url: callback_url.to_string(),
            code_challenge: Some(challenge.code_challenge),
            code_challenge_method: Some(CodeChallengeMethod::S256),
            limit: self.limit,
            state: Some(state),
            base_url: self.base_url.clone(),
        })
    }

    /// Resolve the startup state from storage and callback parameters.
    ///
    /// On a validated callback the state becomes `Connecting` and the code is
    /// held for [`OAuthFlow::connect`].
    pub fn initialize(&mut self, params: &CallbackParams) -> Result<(), AuthError> {
        // Every callback is a fresh page load.
        self.state = ConnectionState::Initializing;

        if self.store.api_key().is_some() {
            self.apply(FlowEvent::KeyFound);
            return Ok(());
        }

        if let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) {
            let stored = self.store.get(STATE_STORAGE_KEY);
            let received = params.state.as_deref();

            let matches = matches!((stored.as_deref(), received), (Some(s), Some(r)) if s == r);
            if !matches {
                tracing::error!("OAuth state mismatch detected");
                self.store.remove(STATE_STORAGE_KEY)?;
                self.store.remove(CODE_VERIFIER_STORAGE_KEY)?;
                self.apply(FlowEvent::StateRejected);
                return Err(AuthError::StateMismatch);
            }

            self.store.remove(STATE_STORAGE_KEY)?;
            self.pending_code = Some(code.to_string());
            self.apply(FlowEvent::StateValidated);
            return Ok(());
        }

        if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
            tracing::warn!(error = %error, "provider returned an authorization error");
            self.apply(FlowEvent::ProviderError(error.to_string()));
            return Ok(());
        }

        if params.is_empty() {
            self.apply(FlowEvent::NothingPending);
            Ok(())
        } else {
            self.apply(FlowEvent::MissingCode);
            Err(AuthError::MissingCode)
        }
    }

    /// Exchange the code held by a validated callback for an API key.
    ///
    /// The code is consumed, so a second call never re-sends it.
    pub async fn connect(&mut self) -> Result<ExchangeResponse, AuthError> {
        let Some(code) = self.pending_code.take() else {
            return Err(AuthError::MissingCode);
        };

        let Some(verifier) = self.store.get(CODE_VERIFIER_STORAGE_KEY) else {
            tracing::error!("code verifier not found in storage");
            self.apply(FlowEvent::VerifierMissing);
            return Err(AuthError::MissingVerifier);
        };

        let result = self
            .exchanger
            .exchange(&code, &verifier, CodeChallengeMethod::S256)
            .await;
        let cleared = self.store.remove(CODE_VERIFIER_STORAGE_KEY);

        // Storage failures still end the attempt; the code is already spent.
        let outcome = match (result, cleared) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err.into()),
            (Ok(response), Ok(())) => self
                .store
                .set_api_key(&response.key)
                .map(|()| response)
                .map_err(AuthError::from),
        };

        match outcome {
            Ok(response) => {
                self.apply(FlowEvent::ExchangeSucceeded);
                Ok(response)
            }
            Err(err) => {
                tracing::error!("failed to exchange authorization code: {err}");
                self.apply(FlowEvent::ExchangeFailed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Run the whole callback protocol: validate, then exchange if needed.
    pub async fn handle_callback(&mut self, params: &CallbackParams) -> Result<(), AuthError> {
        self.initialize(params)?;
        if self.state == ConnectionState::Connecting {
            self.connect().await?;
        }
        Ok(())
    }

    /// Forget the stored API key.
    pub fn disconnect(&mut self) -> Result<(), AuthError> {
        self.store.clear_api_key()?;
        self.apply(FlowEvent::Restart);
        Ok(())
    }
}
