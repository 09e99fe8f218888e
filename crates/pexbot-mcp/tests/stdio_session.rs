//! Drives a full line-delimited session through `PexbotServer::serve`.

use pexbot_mcp::{AuthResolver, PexbotClient, PexbotServer};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn line(v: Value) -> String {
    let mut s = v.to_string();
    s.push('\n');
    s
}

async fn run_session(server: Arc<PexbotServer>, requests: &[Value]) -> HashMap<i64, Value> {
    let input: String = requests.iter().cloned().map(line).collect();
    let out = server
        .serve(tokio::io::BufReader::new(input.as_bytes()), Vec::new())
        .await
        .unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| {
            let v: Value = serde_json::from_str(l).unwrap();
            (v["id"].as_i64().unwrap(), v)
        })
        .collect()
}

#[tokio::test]
async fn login_then_trade_over_stdio() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "bot@pex.bot", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "jwt-session"})))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("authorization", "Bearer jwt-session"))
        .and(body_json(json!({
            "symbol": "BTC-KRW",
            "side": "buy",
            "order_type": "limit",
            "price": "50000000",
            "quantity": "0.01"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"order_id": "o-9", "status": "open"})))
        .expect(1)
        .mount(&backend)
        .await;

    let client = PexbotClient::with_auth(&backend.uri(), AuthResolver::anonymous()).unwrap();
    let server = Arc::new(PexbotServer::new(client));

    // Login must complete before the order is sent, so run two sessions.
    let first = run_session(
        Arc::clone(&server),
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "login", "arguments": {"email": "bot@pex.bot", "password": "pw"}}}),
        ],
    )
    .await;
    assert_eq!(first.len(), 2);
    assert_eq!(first[&1]["result"]["serverInfo"]["name"], "pexbot-mcp");
    assert_eq!(first[&2]["result"]["isError"], false);

    let second = run_session(
        Arc::clone(&server),
        &[json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                 "params": {"name": "place_order", "arguments": {
                     "symbol": "BTC-KRW", "side": "buy", "order_type": "limit",
                     "price": "50000000", "quantity": "0.01"}}})],
    )
    .await;
    let result = &second[&3]["result"];
    assert_eq!(result["isError"], false);
    let text = result["content"][0]["text"].as_str().unwrap();
    let order: Value = serde_json::from_str(text).unwrap();
    assert_eq!(order["order_id"], "o-9");
}

#[tokio::test]
async fn public_resources_and_failed_tool_over_stdio() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/decisions"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"agent": "a1", "side": "buy"}])))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/markets/NOPE-KRW/ticker"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Market not found"})))
        .expect(1)
        .mount(&backend)
        .await;

    let client = PexbotClient::with_auth(
        &backend.uri(),
        AuthResolver::new(Some(zeroize::Zeroizing::new("pk_test".into())), None, None),
    )
    .unwrap();
    let server = Arc::new(PexbotServer::new(client));

    let responses = run_session(
        server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "resources/read",
                   "params": {"uri": "pexbot://decisions/recent"}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "get_ticker", "arguments": {"symbol": "NOPE-KRW"}}}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "prompts/get",
                   "params": {"name": "market_analysis", "arguments": {"symbol": "ETH-KRW"}}}),
        ],
    )
    .await;
    assert_eq!(responses.len(), 3);

    let contents = &responses[&1]["result"]["contents"][0];
    assert_eq!(contents["uri"], "pexbot://decisions/recent");
    assert_eq!(contents["mimeType"], "application/json");
    assert!(contents["text"].as_str().unwrap().contains("a1"));

    let failed = &responses[&2]["result"];
    assert_eq!(failed["isError"], true);
    let text = failed["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("404"), "{text}");
    assert!(text.contains("Market not found"), "{text}");

    let prompt = &responses[&3]["result"]["messages"][0]["content"]["text"];
    assert!(prompt.as_str().unwrap().contains("ETH-KRW"));
}
