//! MCP server: routes JSON-RPC methods to the tool, resource, and prompt catalogs.
//!
//! Requests arrive one per line. Each runs on its own task; responses funnel
//! through a channel to a single writer so output lines never interleave.

use crate::client::PexbotClient;
use crate::error::PexbotError;
use crate::protocol::{
    parse_request, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::{prompts, resources, tools};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "pexbot-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The pex.bot MCP server.
pub struct PexbotServer {
    client: PexbotClient,
}

impl PexbotServer {
    pub fn new(client: PexbotClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PexbotClient {
        &self.client
    }

    /// Handle one raw line. Returns `None` for notifications.
    pub async fn handle_line(&self, raw: &str) -> Option<JsonRpcResponse> {
        match parse_request(raw) {
            Ok(request) => self.handle(request).await,
            Err(response) => Some(response),
        }
    }

    /// Dispatch a parsed request. Returns `None` for notifications.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        let result = match request.method.as_str() {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::tool_definitions() })),
            "tools/call" => self.call_tool(&request.params).await,
            "resources/list" => Ok(json!({ "resources": resources::resource_definitions() })),
            "resources/read" => self.read_resource(&request.params).await,
            "prompts/list" => Ok(json!({ "prompts": prompts::prompt_definitions() })),
            "prompts/get" => self.get_prompt(&request.params),
            other => Err((METHOD_NOT_FOUND, format!("method not found: {other}"))),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err((code, message)) => JsonRpcResponse::error(id, code, message),
        })
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "subscribe": false, "listChanged": false },
                "prompts": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        })
    }

    async fn call_tool(&self, params: &Value) -> Result<Value, (i64, String)> {
        let name = params["name"]
            .as_str()
            .ok_or((INVALID_PARAMS, "tools/call requires a tool name".to_string()))?;
        let tool = tools::find_tool(name)
            .ok_or_else(|| (INVALID_PARAMS, format!("unknown tool: {name}")))?;
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);

        info!(tool = name, "Tool call");
        Ok(tool.call(&self.client, args).await.to_envelope())
    }

    async fn read_resource(&self, params: &Value) -> Result<Value, (i64, String)> {
        let uri = params["uri"]
            .as_str()
            .ok_or((INVALID_PARAMS, "resources/read requires a uri".to_string()))?;
        let resource = resources::find_resource(uri)
            .ok_or_else(|| (INVALID_PARAMS, format!("unknown resource: {uri}")))?;
        resource
            .read(&self.client)
            .await
            .map_err(|e| (error_code(&e), e.to_string()))
    }

    fn get_prompt(&self, params: &Value) -> Result<Value, (i64, String)> {
        let name = params["name"]
            .as_str()
            .ok_or((INVALID_PARAMS, "prompts/get requires a prompt name".to_string()))?;
        let prompt = prompts::find_prompt(name)
            .ok_or_else(|| (INVALID_PARAMS, format!("unknown prompt: {name}")))?;
        let args = params["arguments"].as_object().cloned().unwrap_or_else(Map::new);
        prompt
            .get(&args)
            .map_err(|e| (error_code(&e), e.to_string()))
    }

    /// Serve line-delimited JSON-RPC until `reader` reaches EOF.
    ///
    /// Returns the writer once every in-flight request has been answered.
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, mut writer: W) -> std::io::Result<W>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        // Partial reads from a cancelled `read_until` stay here and are resumed.
        let mut buf = Vec::new();

        loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => {
                    if read? == 0 && buf.is_empty() {
                        break;
                    }
                    let line = match String::from_utf8(std::mem::take(&mut buf)) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(error = %e, "Dropping non-UTF-8 input line");
                            let _ = tx.send(JsonRpcResponse::error(
                                Value::Null,
                                PARSE_ERROR,
                                format!("parse error: {e}"),
                            ));
                            continue;
                        }
                    };
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = server.handle_line(&line).await {
                            let _ = tx.send(response);
                        }
                    });
                }
                Some(response) = rx.recv() => write_response(&mut writer, &response).await?,
            }
        }

        // Drain responses from requests still in flight at EOF.
        drop(tx);
        while let Some(response) = rx.recv().await {
            write_response(&mut writer, &response).await?;
        }
        writer.flush().await?;
        Ok(writer)
    }

    /// Serve on the process's stdin/stdout.
    pub async fn serve_stdio(self: Arc<Self>) -> std::io::Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await?;
        Ok(())
    }
}

fn error_code(e: &PexbotError) -> i64 {
    match e {
        PexbotError::InvalidInput(_) => INVALID_PARAMS,
        _ => INTERNAL_ERROR,
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> std::io::Result<()> {
    let mut line = serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"serialization failed"},"id":null}"#
            .to_string()
    });
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthResolver;
    use crate::protocol::INVALID_REQUEST;

    fn offline_server() -> PexbotServer {
        PexbotServer::new(
            PexbotClient::with_auth("http://127.0.0.1:9", AuthResolver::anonymous()).unwrap(),
        )
    }

    async fn call(server: &PexbotServer, raw: &str) -> JsonRpcResponse {
        server.handle_line(raw).await.expect("expected a response")
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = offline_server();
        let resp = call(&server, r#"{"jsonrpc":"2.0","method":"initialize","params":{},"id":1}"#).await;
        let result = resp.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "pexbot-mcp");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert!(result["capabilities"]["prompts"].is_object());
    }

    #[tokio::test]
    async fn test_ping_preserves_id() {
        let server = offline_server();
        let resp = call(&server, r#"{"jsonrpc":"2.0","method":"ping","id":"my-id"}"#).await;
        assert_eq!(resp.id, json!("my-id"));
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let server = offline_server();
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_lists() {
        let server = offline_server();
        let tools = call(&server, r#"{"jsonrpc":"2.0","method":"tools/list","id":1}"#).await;
        assert_eq!(tools.result.unwrap()["tools"].as_array().unwrap().len(), 16);
        let res = call(&server, r#"{"jsonrpc":"2.0","method":"resources/list","id":2}"#).await;
        assert_eq!(res.result.unwrap()["resources"].as_array().unwrap().len(), 4);
        let prompts = call(&server, r#"{"jsonrpc":"2.0","method":"prompts/list","id":3}"#).await;
        assert_eq!(prompts.result.unwrap()["prompts"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = offline_server();
        let resp = call(&server, r#"{"jsonrpc":"2.0","method":"unknown","id":1}"#).await;
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_lines() {
        let server = offline_server();
        let resp = call(&server, "not json").await;
        assert_eq!(resp.error.unwrap().code, PARSE_ERROR);
        let resp = call(&server, r#"{"jsonrpc":"1.0","method":"ping","id":1}"#).await;
        assert_eq!(resp.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let server = offline_server();
        let resp = call(
            &server,
            r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"nope","arguments":{}},"id":1}"#,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_envelope_not_rpc_error() {
        let server = offline_server();
        let resp = call(
            &server,
            r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"get_balance"},"id":1}"#,
        )
        .await;
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Authentication required"));
    }

    #[tokio::test]
    async fn test_prompt_get() {
        let server = offline_server();
        let resp = call(
            &server,
            r#"{"jsonrpc":"2.0","method":"prompts/get","params":{"name":"market_analysis","arguments":{"symbol":"BTC-KRW"}},"id":1}"#,
        )
        .await;
        let result = resp.result.unwrap();
        assert!(result["messages"][0]["content"]["text"]
            .as_str()
            .unwrap()
            .contains("BTC-KRW"));

        let resp = call(
            &server,
            r#"{"jsonrpc":"2.0","method":"prompts/get","params":{"name":"market_analysis"},"id":2}"#,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let server = offline_server();
        let resp = call(
            &server,
            r#"{"jsonrpc":"2.0","method":"resources/read","params":{"uri":"pexbot://nope"},"id":1}"#,
        )
        .await;
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_serve_answers_every_request() {
        let server = Arc::new(offline_server());
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"initialize","params":{},"id":1}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","method":"tools/list","id":2}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"ping","id":3}"#, "\n",
        );
        let out = server
            .serve(tokio::io::BufReader::new(input.as_bytes()), Vec::new())
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut ids: Vec<i64> = text
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["id"].as_i64().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_serve_survives_non_utf8_line() {
        let server = Arc::new(offline_server());
        let mut input: Vec<u8> = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","method":"ping","id":7}"#);
        input.push(b'\n');

        let out = server
            .serve(tokio::io::BufReader::new(input.as_slice()), Vec::new())
            .await
            .unwrap();

        let responses: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        let parse_error = responses.iter().find(|r| r["id"].is_null()).unwrap();
        assert_eq!(parse_error["error"]["code"], PARSE_ERROR);
        let pong = responses.iter().find(|r| r["id"] == json!(7)).unwrap();
        assert!(pong.get("error").is_none());
    }

    #[tokio::test]
    async fn test_serve_handles_last_line_without_newline() {
        let server = Arc::new(offline_server());
        let input = r#"{"jsonrpc":"2.0","method":"ping","id":1}"#;
        let out = server
            .serve(tokio::io::BufReader::new(input.as_bytes()), Vec::new())
            .await
            .unwrap();
        let resp: Value = serde_json::from_str(String::from_utf8(out).unwrap().trim()).unwrap();
        assert_eq!(resp["id"], 1);
    }

    #[tokio::test]
    async fn test_null_id_request_is_answered() {
        let server = offline_server();
        let resp = call(&server, r#"{"jsonrpc":"2.0","method":"ping","id":null}"#).await;
        assert_eq!(resp.id, Value::Null);
        assert!(resp.error.is_none());
    }
}
