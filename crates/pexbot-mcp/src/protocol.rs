//! JSON-RPC 2.0 message types for the MCP stdio transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// JSON-RPC 2.0 request or notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Parse one line into a request, or the error response to send back.
pub fn parse_request(raw: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {e}"))
    })?;
    let id = value.get("id").cloned();
    let mut request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(
            id.clone().unwrap_or(Value::Null),
            INVALID_REQUEST,
            format!("invalid request: {e}"),
        )
    })?;
    // `"id": null` is still a request; only an absent id marks a notification.
    request.id = id;
    if request.jsonrpc != "2.0" {
        return Err(JsonRpcResponse::error(
            request.id.unwrap_or(Value::Null),
            INVALID_REQUEST,
            "jsonrpc field must be \"2.0\"",
        ));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_request() {
        let req = parse_request(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap();
        assert_eq!(req.method, "ping");
        assert_eq!(req.id, Some(serde_json::json!(1)));
        assert!(req.params.is_null());
    }

    #[test]
    fn test_parse_notification() {
        let req = parse_request(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn test_parse_null_id_is_not_notification() {
        let req = parse_request(r#"{"jsonrpc":"2.0","method":"ping","id":null}"#).unwrap();
        assert!(!req.is_notification());
        assert_eq!(req.id, Some(Value::Null));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_request("{bad json").unwrap_err();
        assert_eq!(err.error.unwrap().code, PARSE_ERROR);
        assert_eq!(err.id, Value::Null);
    }

    #[test]
    fn test_parse_wrong_version_keeps_id() {
        let err = parse_request(r#"{"jsonrpc":"1.0","method":"ping","id":"x"}"#).unwrap_err();
        assert_eq!(err.error.unwrap().code, INVALID_REQUEST);
        assert_eq!(err.id, serde_json::json!("x"));
    }

    #[test]
    fn test_parse_missing_method() {
        let err = parse_request(r#"{"jsonrpc":"2.0","id":3}"#).unwrap_err();
        assert_eq!(err.error.unwrap().code, INVALID_REQUEST);
    }

    #[test]
    fn test_response_serialization_skips_empty_fields() {
        let ok = serde_json::to_value(JsonRpcResponse::success(serde_json::json!(1), serde_json::json!({}))).unwrap();
        assert!(ok.get("error").is_none());
        let err = serde_json::to_value(JsonRpcResponse::error(Value::Null, METHOD_NOT_FOUND, "nope")).unwrap();
        assert!(err.get("result").is_none());
        assert_eq!(err["error"]["code"], -32601);
    }
}
