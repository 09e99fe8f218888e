//! Error types for the pex.bot MCP crate.

/// All errors that can occur while serving pex.bot tools.
#[derive(Debug, thiserror::Error)]
pub enum PexbotError {
    #[error("Authentication required: set PEXBOT_API_KEY (or PEXBOT_TOKEN, or PEXBOT_EMAIL and PEXBOT_PASSWORD), or call the register tool")]
    AuthenticationRequired,

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Proof-of-work exhausted after {attempts} attempts")]
    PowExhausted { attempts: u64 },

    #[error("API {method} {path} failed ({status}): {}", body_or_status(.body, .status))]
    Http {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PexbotError {
    fn from(e: reqwest::Error) -> Self {
        PexbotError::Network(e.to_string())
    }
}

impl PexbotError {
    /// HTTP status code, if this error came from a backend response.
    pub fn status(&self) -> Option<u16> {
        match self {
            PexbotError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Best-effort human message from a backend error body.
    ///
    /// Looks for `message`, `error` or `detail` string fields in a JSON body,
    /// then falls back to the raw text, then to the status line.
    pub fn server_message(&self) -> Option<String> {
        match self {
            PexbotError::Http { status, body, .. } => Some(extract_message(body, *status)),
            _ => None,
        }
    }
}

/// Pull a message out of an error body, falling back to raw text or status line.
pub(crate) fn extract_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["message", "error", "detail"] {
            if let Some(msg) = value[field].as_str() {
                if !msg.is_empty() {
                    return msg.to_string();
                }
            }
        }
    }
    display_body(body, status)
}

fn body_or_status(body: &str, status: &u16) -> String {
    display_body(body, *status)
}

fn display_body(body: &str, status: u16) -> String {
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown status")
        .to_string()
}

/// Convenience type alias.
pub type PexbotResult<T> = Result<T, PexbotError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, body: &str) -> PexbotError {
        PexbotError::Http {
            method: "DELETE".into(),
            path: "/orders/abc".into(),
            status,
            body: body.into(),
        }
    }

    #[test]
    fn test_http_display_includes_status_and_body() {
        let msg = http(404, r#"{"detail":"Order not found"}"#).to_string();
        assert_eq!(
            msg,
            r#"API DELETE /orders/abc failed (404): {"detail":"Order not found"}"#
        );
    }

    #[test]
    fn test_http_display_empty_body_uses_status_line() {
        let msg = http(503, "").to_string();
        assert!(msg.ends_with("(503): Service Unavailable"), "{msg}");
    }

    #[test]
    fn test_server_message_prefers_json_fields() {
        assert_eq!(
            http(401, r#"{"message":"bad password"}"#).server_message().as_deref(),
            Some("bad password")
        );
        assert_eq!(
            http(400, r#"{"detail":"email taken"}"#).server_message().as_deref(),
            Some("email taken")
        );
    }

    #[test]
    fn test_server_message_falls_back_to_raw_text() {
        assert_eq!(
            http(500, "upstream exploded").server_message().as_deref(),
            Some("upstream exploded")
        );
        assert_eq!(
            http(401, "").server_message().as_deref(),
            Some("Unauthorized")
        );
    }

    #[test]
    fn test_status_only_for_http() {
        assert_eq!(http(404, "").status(), Some(404));
        assert_eq!(PexbotError::AuthenticationRequired.status(), None);
    }
}
