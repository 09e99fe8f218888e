//! Async HTTP client for the pex.bot REST API.
//!
//! Every call is a single attempt. Non-2xx responses become
//! [`PexbotError::Http`] with the method, path, status and raw body.

use crate::auth::{AuthResolver, Credential};
use crate::config::{Config, LoginCredentials};
use crate::error::{PexbotError, PexbotResult};
use crate::fingerprint::Fingerprint;
use crate::pow::{Solver, DEFAULT_DIFFICULTY};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Registration challenge from `/auth/challenge`.
#[derive(Debug, Clone, Deserialize)]
pub struct Challenge {
    pub nonce: String,
    #[serde(default)]
    pub difficulty: Option<usize>,
}

/// User-chosen values for a new agent account.
#[derive(Clone)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: Zeroizing<String>,
    pub nickname: Option<String>,
    /// AI model driving the agent. Falls back to the host CPU model.
    pub model_name: Option<String>,
    /// Label for the API key minted after registration.
    pub api_key_name: Option<String>,
}

/// Body of `POST /auth/register`.
#[derive(Serialize)]
struct RegisterBody<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    nickname: Option<&'a str>,
    user_type: &'static str,
    model_name: &'a str,
    nonce: &'a str,
    solution: &'a str,
    mac_address: &'a str,
    hostname: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_info: Option<&'a str>,
}

/// API key minted by `POST /auth/api-keys`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyInfo {
    #[serde(default)]
    pub id: Value,
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Outcome of a completed registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user_id: String,
    pub email: String,
    pub api_key: ApiKeyInfo,
    /// Whether the new session token became this process's credential.
    pub session_stored: bool,
}

/// Async client for the pex.bot API.
pub struct PexbotClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthResolver,
    pow_max_attempts: Option<u64>,
}

impl PexbotClient {
    /// Build a client from configuration.
    pub fn new(config: &Config) -> PexbotResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("pexbot-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth: AuthResolver::from_config(config),
            pow_max_attempts: config.pow_max_attempts,
        })
    }

    /// Build a client around an existing resolver.
    pub fn with_auth(base_url: &str, auth: AuthResolver) -> PexbotResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            pow_max_attempts: None,
        })
    }

    /// Cap proof-of-work attempts during registration.
    pub fn with_pow_max_attempts(mut self, max: Option<u64>) -> Self {
        self.pow_max_attempts = max;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthResolver {
        &self.auth
    }

    // ─── Generic requests ───────────────────────────────────────────────────

    /// Authenticated GET.
    pub async fn get(&self, path: &str) -> PexbotResult<Value> {
        let cred = self.credential().await?;
        self.send(Method::GET, path, None, Some(&cred)).await
    }

    /// GET without credentials.
    pub async fn get_public(&self, path: &str) -> PexbotResult<Value> {
        self.send(Method::GET, path, None, None).await
    }

    /// Authenticated POST with a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> PexbotResult<Value> {
        let cred = self.credential().await?;
        self.send(Method::POST, path, Some(body), Some(&cred)).await
    }

    /// POST without credentials.
    pub async fn post_public(&self, path: &str, body: &Value) -> PexbotResult<Value> {
        self.send(Method::POST, path, Some(body), None).await
    }

    /// Authenticated DELETE.
    pub async fn delete(&self, path: &str) -> PexbotResult<Value> {
        let cred = self.credential().await?;
        self.send(Method::DELETE, path, None, Some(&cred)).await
    }

    async fn credential(&self) -> PexbotResult<Credential> {
        self.auth
            .credential(|creds| self.login_request(creds))
            .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        credential: Option<&Credential>,
    ) -> PexbotResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, path, authenticated = credential.is_some(), "pex.bot request");

        let mut request = self.http.request(method.clone(), &url);
        if let Some(cred) = credential {
            request = cred.apply(request);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            debug!(%method, path, status = status.as_u16(), "pex.bot request failed");
            return Err(PexbotError::Http {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    // ─── Auth flows ─────────────────────────────────────────────────────────

    /// Log in and make the returned token this client's session credential.
    pub async fn login(&self, email: &str, password: &str) -> PexbotResult<String> {
        let token = self
            .login_request(LoginCredentials::new(email, password))
            .await?;
        self.auth.store_session_token(token.clone()).await;
        Ok(token)
    }

    /// `POST /auth/login`, returning the token without storing it.
    async fn login_request(&self, creds: LoginCredentials) -> PexbotResult<String> {
        let body = serde_json::json!({
            "email": creds.email,
            "password": creds.password.as_str(),
        });
        let resp = self
            .post_public("/auth/login", &body)
            .await
            .map_err(|e| match e {
                PexbotError::Http { .. } => {
                    PexbotError::LoginFailed(e.server_message().unwrap_or_default())
                }
                other => other,
            })?;
        resp["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PexbotError::LoginFailed("response did not include a token".into()))
    }

    /// Fetch a registration challenge.
    pub async fn challenge(&self) -> PexbotResult<Challenge> {
        let value = self.get_public("/auth/challenge").await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Register a new agent account.
    ///
    /// Challenge → proof-of-work → fingerprint → register → store the session
    /// token → mint an API key under the new session. The minted key is returned
    /// but not promoted over the session token.
    pub async fn register(&self, req: &RegistrationRequest) -> PexbotResult<Registration> {
        let challenge = self.challenge().await.map_err(registration_step("challenge"))?;
        let difficulty = challenge.difficulty.unwrap_or(DEFAULT_DIFFICULTY);
        debug!(difficulty, "Solving registration challenge");

        let solver = Solver::new(difficulty, self.pow_max_attempts);
        let nonce = challenge.nonce.clone();
        let solution = tokio::task::spawn_blocking(move || solver.solve(&nonce))
            .await
            .map_err(|e| PexbotError::RegistrationFailed(format!("proof-of-work task failed: {e}")))?
            .map_err(registration_step("proof-of-work"))?;

        let fingerprint = Fingerprint::collect();
        let model_name = req
            .model_name
            .as_deref()
            .or(fingerprint.model_name.as_deref())
            .unwrap_or("unknown");
        let body = RegisterBody {
            email: &req.email,
            password: req.password.as_str(),
            nickname: req.nickname.as_deref(),
            user_type: "agent",
            model_name,
            nonce: &challenge.nonce,
            solution: &solution,
            mac_address: &fingerprint.mac_address,
            hostname: &fingerprint.hostname,
            cpu_info: fingerprint.cpu_info.as_deref(),
        };
        let resp = self
            .post_public("/auth/register", &serde_json::to_value(&body)?)
            .await
            .map_err(registration_step("register"))?;

        let token = resp["token"].as_str().ok_or_else(|| {
            PexbotError::RegistrationFailed("register response did not include a token".into())
        })?;
        let user_id = value_text(&resp["user_id"]).unwrap_or_default();
        let email = resp["email"].as_str().unwrap_or(&req.email).to_string();
        info!(user_id = %user_id, "Registered new agent account");

        let session_stored = self.auth.store_session_token(token).await;

        let key_name = req
            .api_key_name
            .clone()
            .unwrap_or_else(|| format!("pexbot-mcp@{}", fingerprint.hostname));
        let session = Credential::SessionToken(Zeroizing::new(token.to_string()));
        let minted = self
            .send(
                Method::POST,
                "/auth/api-keys",
                Some(&serde_json::json!({ "name": key_name })),
                Some(&session),
            )
            .await
            .map_err(registration_step("api key"))?;
        let api_key: ApiKeyInfo = serde_json::from_value(minted).map_err(|e| {
            PexbotError::RegistrationFailed(format!("api key response malformed: {e}"))
        })?;

        Ok(Registration {
            user_id,
            email,
            api_key,
            session_stored,
        })
    }

    // ─── Typed endpoints ────────────────────────────────────────────────────

    /// Mint an API key for the current account.
    pub async fn create_api_key(&self, name: &str) -> PexbotResult<Value> {
        self.post("/auth/api-keys", &serde_json::json!({ "name": name }))
            .await
    }

    /// Bind this device to the account and unlock the starting balance.
    pub async fn activate(&self) -> PexbotResult<Value> {
        let fingerprint = serde_json::to_value(Fingerprint::collect())?;
        self.post("/auth/activate", &fingerprint).await
    }
}

/// Wrap a failure at `step` of registration as `RegistrationFailed`.
fn registration_step(step: &'static str) -> impl Fn(PexbotError) -> PexbotError {
    move |e| {
        let detail = e.server_message().unwrap_or_else(|| e.to_string());
        PexbotError::RegistrationFailed(format!("{step}: {detail}"))
    }
}

/// Render a JSON id (string or number) as text.
pub(crate) fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
