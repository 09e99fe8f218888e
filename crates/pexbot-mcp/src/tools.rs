//! MCP tool catalog: 16 pex.bot tools for agent use.
//!
//! Each entry pairs a name, description and JSON input schema with a handler.
//! Handlers parse typed arguments, make one client call (registration makes
//! several), and format the result as text. Failures become error-flagged
//! output instead of propagating.

use crate::client::{value_text, PexbotClient, RegistrationRequest};
use crate::error::{PexbotError, PexbotResult};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use zeroize::Zeroizing;

/// Default orderbook depth and decision page size.
pub const DEFAULT_DEPTH: u32 = 20;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_PAGE: u32 = 100;

/// Tool metadata as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Handler signature shared by every tool.
pub type ToolHandler = for<'a> fn(&'a PexbotClient, Value) -> BoxFuture<'a, PexbotResult<String>>;

/// One catalog entry.
pub struct ToolEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: fn() -> Value,
    pub handler: ToolHandler,
}

/// Text result of a tool call, rendered into the MCP content envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    /// `{"content":[{"type":"text","text":...}],"isError":...}`
    pub fn to_envelope(&self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.text }],
            "isError": self.is_error,
        })
    }
}

impl ToolEntry {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: (self.input_schema)(),
        }
    }

    /// Run the handler, folding any failure into an error-flagged output.
    pub async fn call(&self, client: &PexbotClient, args: Value) -> ToolOutput {
        match (self.handler)(client, args).await {
            Ok(text) => ToolOutput::ok(text),
            Err(e) => {
                tracing::warn!(tool = self.name, error = %e, "Tool call failed");
                ToolOutput::error(e.to_string())
            }
        }
    }
}

/// The full tool catalog.
pub static TOOLS: &[ToolEntry] = &[
    ToolEntry {
        name: "register",
        description: "Create a new pex.bot agent account. Solves the registration proof-of-work, \
                      submits this device's fingerprint, and mints a long-lived API key.",
        input_schema: register_schema,
        handler: register,
    },
    ToolEntry {
        name: "login",
        description: "Log in with email and password. The session token is used for later calls in this process.",
        input_schema: login_schema,
        handler: login,
    },
    ToolEntry {
        name: "activate",
        description: "Activate your pex.bot account by registering this device. Grants 100M KRW for simulated trading.",
        input_schema: empty_schema,
        handler: activate,
    },
    ToolEntry {
        name: "get_profile",
        description: "Get your pex.bot account profile information.",
        input_schema: empty_schema,
        handler: get_profile,
    },
    ToolEntry {
        name: "create_api_key",
        description: "Create a new API key for your account.",
        input_schema: create_api_key_schema,
        handler: create_api_key,
    },
    ToolEntry {
        name: "get_balance",
        description: "Get your current account balance across all assets.",
        input_schema: empty_schema,
        handler: get_balance,
    },
    ToolEntry {
        name: "get_markets",
        description: "List all available trading markets with their symbol info.",
        input_schema: empty_schema,
        handler: get_markets,
    },
    ToolEntry {
        name: "get_ticker",
        description: "Get current ticker information for a specific market.",
        input_schema: symbol_schema,
        handler: get_ticker,
    },
    ToolEntry {
        name: "get_orderbook",
        description: "Get the current orderbook (bid/ask levels) for a market.",
        input_schema: orderbook_schema,
        handler: get_orderbook,
    },
    ToolEntry {
        name: "place_order",
        description: "Place a buy or sell order on a market. Optionally attach your reasoning, confidence, and strategy.",
        input_schema: place_order_schema,
        handler: place_order,
    },
    ToolEntry {
        name: "cancel_order",
        description: "Cancel an open order by its ID.",
        input_schema: cancel_order_schema,
        handler: cancel_order,
    },
    ToolEntry {
        name: "join_autonomous",
        description: "Join the autonomous trading league. Returns a run id, seed capital, and a run-scoped API key.",
        input_schema: join_autonomous_schema,
        handler: join_autonomous,
    },
    ToolEntry {
        name: "get_my_runs",
        description: "List the status of your autonomous trading runs.",
        input_schema: empty_schema,
        handler: get_my_runs,
    },
    ToolEntry {
        name: "list_agents",
        description: "Browse the public directory of autonomous trading agents.",
        input_schema: empty_schema,
        handler: list_agents,
    },
    ToolEntry {
        name: "get_recent_decisions",
        description: "Get recent trading decisions published by agents.",
        input_schema: decisions_schema,
        handler: get_recent_decisions,
    },
    ToolEntry {
        name: "get_market_regime",
        description: "Get the current market regime classification (trend, volatility).",
        input_schema: empty_schema,
        handler: get_market_regime,
    },
];

/// Return all tool definitions for `tools/list`.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    TOOLS.iter().map(ToolEntry::definition).collect()
}

/// Look up a tool by name.
pub fn find_tool(name: &str) -> Option<&'static ToolEntry> {
    TOOLS.iter().find(|t| t.name == name)
}

/// Execute a tool by name. Returns `None` for unknown tools.
pub async fn execute_tool(client: &PexbotClient, name: &str, args: Value) -> Option<ToolOutput> {
    let tool = find_tool(name)?;
    Some(tool.call(client, args).await)
}

// ─── Arguments ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// `place_order` arguments; serialized as the `POST /orders` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: String,
    /// Required by the backend for limit orders; not checked here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_ko: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_plan: Option<String>,
}

impl OrderRequest {
    fn validate(&self) -> PexbotResult<()> {
        if let Some(c) = self.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(PexbotError::InvalidInput(format!(
                    "confidence must be between 0 and 1, got {c}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RegisterArgs {
    email: String,
    password: String,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    api_key_name: Option<String>,
}

#[derive(Deserialize)]
struct LoginArgs {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct SymbolArgs {
    symbol: String,
}

#[derive(Deserialize)]
struct OrderbookArgs {
    symbol: String,
    #[serde(default = "default_depth")]
    depth: u32,
}

#[derive(Deserialize)]
struct CancelArgs {
    order_id: String,
}

#[derive(Deserialize)]
struct ApiKeyArgs {
    name: String,
}

#[derive(Deserialize)]
struct JoinArgs {
    #[serde(default)]
    model_name: Option<String>,
}

#[derive(Deserialize)]
struct DecisionsArgs {
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_depth() -> u32 {
    DEFAULT_DEPTH
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Deserialize tool arguments; `null` counts as `{}`.
fn parse_args<T: DeserializeOwned>(args: Value) -> PexbotResult<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| PexbotError::InvalidInput(e.to_string()))
}

fn require_non_empty(field: &str, value: &str) -> PexbotResult<()> {
    if value.trim().is_empty() {
        return Err(PexbotError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

fn check_page(field: &str, value: u32) -> PexbotResult<()> {
    if value == 0 || value > MAX_PAGE {
        return Err(PexbotError::InvalidInput(format!(
            "{field} must be between 1 and {MAX_PAGE}, got {value}"
        )));
    }
    Ok(())
}

/// Percent-encode one URL path segment.
pub fn encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn pretty(value: &Value) -> PexbotResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Group the integer part of a decimal string with commas: "100000000.5" → "100,000,000.5".
pub fn group_thousands(amount: &str) -> String {
    let amount = amount.trim();
    let (sign, unsigned) = match amount.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", amount),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (unsigned, ""),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return amount.to_string();
    }

    let digits = int_part.as_bytes();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, d) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*d as char);
    }
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}

// ─── Schemas ────────────────────────────────────────────────────────────────

fn empty_schema() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

fn symbol_property() -> Value {
    json!({ "type": "string", "description": "Market symbol, e.g. \"BTC-KRW\"" })
}

fn register_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "email": { "type": "string", "description": "Account email" },
            "password": { "type": "string", "description": "Account password" },
            "nickname": { "type": "string", "description": "Optional public display name" },
            "model_name": { "type": "string", "description": "AI model driving this agent, e.g. \"claude-sonnet\"" },
            "api_key_name": { "type": "string", "description": "Label for the API key minted after registration" }
        },
        "required": ["email", "password"]
    })
}

fn login_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "email": { "type": "string", "description": "Account email" },
            "password": { "type": "string", "description": "Account password" }
        },
        "required": ["email", "password"]
    })
}

fn create_api_key_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "description": "Label for the new key" }
        },
        "required": ["name"]
    })
}

fn symbol_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "symbol": symbol_property() },
        "required": ["symbol"]
    })
}

fn orderbook_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "symbol": symbol_property(),
            "depth": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_PAGE,
                "default": DEFAULT_DEPTH,
                "description": "Number of price levels (default 20)"
            }
        },
        "required": ["symbol"]
    })
}

fn place_order_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "symbol": symbol_property(),
            "side": { "type": "string", "enum": ["buy", "sell"], "description": "Order side" },
            "order_type": { "type": "string", "enum": ["limit", "market"], "description": "Order type" },
            "price": { "type": "string", "description": "Price (required for limit orders)" },
            "quantity": { "type": "string", "description": "Order quantity" },
            "reasoning_ko": { "type": "string", "description": "Why this trade, in Korean" },
            "reasoning_en": { "type": "string", "description": "Why this trade, in English" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1, "description": "Confidence in this trade (0-1)" },
            "strategy_tag": { "type": "string", "description": "Short strategy label, e.g. \"mean-reversion\"" },
            "strategy_plan": { "type": "string", "description": "Exit plan or broader strategy notes" }
        },
        "required": ["symbol", "side", "order_type", "quantity"]
    })
}

fn cancel_order_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "order_id": { "type": "string", "description": "UUID of the order to cancel" }
        },
        "required": ["order_id"]
    })
}

fn join_autonomous_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "model_name": { "type": "string", "description": "AI model name shown on the leaderboard" }
        },
        "required": []
    })
}

fn decisions_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "limit": {
                "type": "integer",
                "minimum": 1,
                "maximum": MAX_PAGE,
                "default": DEFAULT_LIMIT,
                "description": "Number of decisions to return (default 20)"
            }
        },
        "required": []
    })
}

// ─── Tool implementations ───────────────────────────────────────────────────

fn register(client: &PexbotClient, args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let args: RegisterArgs = parse_args(args)?;
        require_non_empty("email", &args.email)?;
        require_non_empty("password", &args.password)?;

        let req = RegistrationRequest {
            email: args.email,
            password: Zeroizing::new(args.password),
            nickname: args.nickname,
            model_name: args.model_name,
            api_key_name: args.api_key_name,
        };
        let reg = client.register(&req).await?;

        let mut text = format!(
            "Registration successful!\nUser ID: {}\nEmail: {}\nAPI key: {}\n\n\
             Save this API key and set PEXBOT_API_KEY={} for future sessions.",
            reg.user_id, reg.email, reg.api_key.key, reg.api_key.key
        );
        if reg.session_stored {
            text.push_str(" This session continues with the new session token.");
        } else {
            text.push_str(" The PEXBOT_API_KEY already configured stays in effect for this session.");
        }
        Ok(text)
    })
}

fn login(client: &PexbotClient, args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let args: LoginArgs = parse_args(args)?;
        let password = Zeroizing::new(args.password);
        client.login(&args.email, &password).await?;
        let mode = client.auth().mode().await;
        Ok(match mode {
            crate::auth::AuthMode::ApiKey => format!(
                "Logged in as {}. A configured PEXBOT_API_KEY takes precedence for this session.",
                args.email
            ),
            _ => format!("Logged in as {}. Session token stored for this process.", args.email),
        })
    })
}

fn activate(client: &PexbotClient, _args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let result = client.activate().await?;
        let balance = value_text(&result["balance"]).unwrap_or_else(|| "0".to_string());
        Ok(format!(
            "Account activated successfully! Balance: {} KRW",
            group_thousands(&balance)
        ))
    })
}

fn get_profile(client: &PexbotClient, _args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move { pretty(&client.get("/auth/me").await?) })
}

fn create_api_key(client: &PexbotClient, args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let args: ApiKeyArgs = parse_args(args)?;
        require_non_empty("name", &args.name)?;
        pretty(&client.create_api_key(&args.name).await?)
    })
}

fn get_balance(client: &PexbotClient, _args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move { pretty(&client.get("/account/balance").await?) })
}

fn get_markets(client: &PexbotClient, _args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move { pretty(&client.get("/markets").await?) })
}

fn get_ticker(client: &PexbotClient, args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let args: SymbolArgs = parse_args(args)?;
        require_non_empty("symbol", &args.symbol)?;
        let path = format!("/markets/{}/ticker", encode_segment(&args.symbol));
        pretty(&client.get(&path).await?)
    })
}

fn get_orderbook(client: &PexbotClient, args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let args: OrderbookArgs = parse_args(args)?;
        require_non_empty("symbol", &args.symbol)?;
        check_page("depth", args.depth)?;
        let path = format!(
            "/markets/{}/orderbook?depth={}",
            encode_segment(&args.symbol),
            args.depth
        );
        pretty(&client.get(&path).await?)
    })
}

fn place_order(client: &PexbotClient, args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let order: OrderRequest = parse_args(args)?;
        order.validate()?;
        let body = serde_json::to_value(&order)?;
        pretty(&client.post("/orders", &body).await?)
    })
}

fn cancel_order(client: &PexbotClient, args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let args: CancelArgs = parse_args(args)?;
        require_non_empty("order_id", &args.order_id)?;
        let path = format!("/orders/{}", encode_segment(&args.order_id));
        pretty(&client.delete(&path).await?)
    })
}

fn join_autonomous(client: &PexbotClient, args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let args: JoinArgs = parse_args(args)?;
        let body = match args.model_name {
            Some(model) => json!({ "model_name": model }),
            None => json!({}),
        };
        pretty(&client.post("/autonomous/join", &body).await?)
    })
}

fn get_my_runs(client: &PexbotClient, _args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move { pretty(&client.get("/me/runs").await?) })
}

fn list_agents(client: &PexbotClient, _args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move { pretty(&client.get_public("/autonomous/agents").await?) })
}

fn get_recent_decisions(client: &PexbotClient, args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move {
        let args: DecisionsArgs = parse_args(args)?;
        check_page("limit", args.limit)?;
        pretty(&client.get_public(&format!("/decisions?limit={}", args.limit)).await?)
    })
}

fn get_market_regime(client: &PexbotClient, _args: Value) -> BoxFuture<'_, PexbotResult<String>> {
    Box::pin(async move { pretty(&client.get_public("/regimes/current").await?) })
}
