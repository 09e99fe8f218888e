//! Credential resolution for authenticated pex.bot calls.
//!
//! Precedence is fixed: a configured API key always wins, then a bearer session
//! token, then a lazy login with configured email/password. The credential slot
//! sits behind an async mutex, so concurrent first calls perform a single login.

use crate::config::{Config, LoginCredentials};
use crate::error::{PexbotError, PexbotResult};
use std::fmt;
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// A credential attached to an outgoing request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Sent as `X-API-Key`.
    ApiKey(Zeroizing<String>),
    /// Sent as `Authorization: Bearer <token>`.
    SessionToken(Zeroizing<String>),
}

impl Credential {
    /// Attach this credential to a request.
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credential::ApiKey(key) => request.header("X-API-Key", key.as_str()),
            Credential::SessionToken(token) => request.bearer_auth(token.as_str()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credential::SessionToken(_) => f.write_str("SessionToken(<redacted>)"),
        }
    }
}

/// Which credential source is in effect, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    ApiKey,
    SessionToken,
    /// No credential yet, but email/password are configured.
    AutoLogin,
    None,
}

#[derive(Default)]
enum CredentialState {
    #[default]
    Unset,
    /// Terminal: never overwritten.
    ApiKey(Zeroizing<String>),
    SessionToken(Zeroizing<String>),
}

/// Owns the credential slot for one client.
pub struct AuthResolver {
    state: Mutex<CredentialState>,
    login: Option<LoginCredentials>,
}

impl AuthResolver {
    pub fn new(
        api_key: Option<Zeroizing<String>>,
        token: Option<Zeroizing<String>>,
        login: Option<LoginCredentials>,
    ) -> Self {
        let state = match (api_key, token) {
            (Some(key), _) => CredentialState::ApiKey(key),
            (None, Some(token)) => CredentialState::SessionToken(token),
            (None, None) => CredentialState::Unset,
        };
        Self {
            state: Mutex::new(state),
            login,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.api_key.clone(),
            config.token.clone(),
            config.login.clone(),
        )
    }

    /// Resolver with no credentials at all.
    pub fn anonymous() -> Self {
        Self::new(None, None, None)
    }

    /// Current credential source.
    pub async fn mode(&self) -> AuthMode {
        match &*self.state.lock().await {
            CredentialState::ApiKey(_) => AuthMode::ApiKey,
            CredentialState::SessionToken(_) => AuthMode::SessionToken,
            CredentialState::Unset if self.login.is_some() => AuthMode::AutoLogin,
            CredentialState::Unset => AuthMode::None,
        }
    }

    /// Resolve the credential for an authenticated call.
    ///
    /// When nothing is set and login credentials exist, `login` is awaited
    /// while the slot is locked and its token is stored. Without login
    /// credentials this fails with `AuthenticationRequired` and `login` is
    /// never called.
    pub async fn credential<F, Fut>(&self, login: F) -> PexbotResult<Credential>
    where
        F: FnOnce(LoginCredentials) -> Fut,
        Fut: Future<Output = PexbotResult<String>>,
    {
        let mut state = self.state.lock().await;
        match &*state {
            CredentialState::ApiKey(key) => return Ok(Credential::ApiKey(key.clone())),
            CredentialState::SessionToken(token) => {
                return Ok(Credential::SessionToken(token.clone()))
            }
            CredentialState::Unset => {}
        }

        let creds = self
            .login
            .clone()
            .ok_or(PexbotError::AuthenticationRequired)?;
        let email = creds.email.clone();
        let token = Zeroizing::new(login(creds).await?);
        info!(email = %email, "Logged in; using session token");
        *state = CredentialState::SessionToken(token.clone());
        Ok(Credential::SessionToken(token))
    }

    /// Store a session token obtained at runtime (login or registration).
    ///
    /// Returns `false` when an API key is configured; the key slot is terminal.
    pub async fn store_session_token(&self, token: impl Into<String>) -> bool {
        let mut state = self.state.lock().await;
        if let CredentialState::ApiKey(_) = &*state {
            warn!("API key configured; ignoring new session token");
            return false;
        }
        *state = CredentialState::SessionToken(Zeroizing::new(token.into()));
        info!("Session token stored");
        true
    }
}
