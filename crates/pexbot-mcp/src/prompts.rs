//! MCP prompt templates for trading agents.

use crate::error::{PexbotError, PexbotResult};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// A declared prompt argument.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Prompt metadata as advertised by `prompts/list`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: &'static [PromptArgument],
}

pub struct PromptEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: &'static [PromptArgument],
    render: fn(&Map<String, Value>) -> String,
}

pub static PROMPTS: &[PromptEntry] = &[
    PromptEntry {
        name: "trading_strategy",
        description: "Plan a trade on one market using live pex.bot data",
        arguments: &[
            PromptArgument {
                name: "symbol",
                description: "Market symbol, e.g. BTC-KRW",
                required: true,
            },
            PromptArgument {
                name: "risk_level",
                description: "low, medium, or high (default medium)",
                required: false,
            },
        ],
        render: render_trading_strategy,
    },
    PromptEntry {
        name: "market_analysis",
        description: "Analyze ticker, orderbook, and regime for a market",
        arguments: &[PromptArgument {
            name: "symbol",
            description: "Market symbol, e.g. BTC-KRW",
            required: true,
        }],
        render: render_market_analysis,
    },
    PromptEntry {
        name: "autonomous_onboarding",
        description: "Walk through registration, activation, and joining the autonomous league",
        arguments: &[PromptArgument {
            name: "model_name",
            description: "AI model name to register under",
            required: false,
        }],
        render: render_onboarding,
    },
];

impl PromptEntry {
    pub fn definition(&self) -> PromptDefinition {
        PromptDefinition {
            name: self.name,
            description: self.description,
            arguments: self.arguments,
        }
    }

    /// Render the prompt as a `prompts/get` result.
    pub fn get(&self, args: &Map<String, Value>) -> PexbotResult<Value> {
        for arg in self.arguments.iter().filter(|a| a.required) {
            let present = args
                .get(arg.name)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.trim().is_empty());
            if !present {
                return Err(PexbotError::InvalidInput(format!(
                    "prompt {} requires argument {}",
                    self.name, arg.name
                )));
            }
        }
        Ok(json!({
            "description": self.description,
            "messages": [{
                "role": "user",
                "content": { "type": "text", "text": (self.render)(args) }
            }]
        }))
    }
}

pub fn prompt_definitions() -> Vec<PromptDefinition> {
    PROMPTS.iter().map(PromptEntry::definition).collect()
}

pub fn find_prompt(name: &str) -> Option<&'static PromptEntry> {
    PROMPTS.iter().find(|p| p.name == name)
}

fn arg<'a>(args: &'a Map<String, Value>, name: &str, default: &'a str) -> &'a str {
    args.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
}

fn render_trading_strategy(args: &Map<String, Value>) -> String {
    let symbol = arg(args, "symbol", "BTC-KRW");
    let risk = arg(args, "risk_level", "medium");
    format!(
        "You are trading {symbol} on pex.bot with a {risk} risk tolerance.\n\n\
         1. Call get_balance to see available funds.\n\
         2. Call get_ticker and get_orderbook for {symbol}.\n\
         3. Call get_market_regime to understand current conditions.\n\
         4. Decide whether to buy, sell, or wait. Size the position for {risk} risk.\n\
         5. If trading, call place_order with reasoning_en, reasoning_ko, a confidence between 0 and 1, \
         and a strategy_tag so your decision is published with your rationale."
    )
}

fn render_market_analysis(args: &Map<String, Value>) -> String {
    let symbol = arg(args, "symbol", "BTC-KRW");
    format!(
        "Analyze the {symbol} market on pex.bot.\n\n\
         Use get_ticker for price and 24h change, get_orderbook (depth 20) for liquidity and spread, \
         get_market_regime for the broader regime, and get_recent_decisions to see what other agents did. \
         Summarize trend, spread, order book imbalance, and a directional bias with your confidence."
    )
}

fn render_onboarding(args: &Map<String, Value>) -> String {
    let model = arg(args, "model_name", "your model name");
    format!(
        "Set up a pex.bot trading agent.\n\n\
         1. If no API key is configured, call register with an email, a password, and model_name \"{model}\". \
         Save the returned API key as PEXBOT_API_KEY.\n\
         2. Call activate to bind this device and receive simulated KRW.\n\
         3. Call join_autonomous with model_name \"{model}\" to enter the league.\n\
         4. Call get_my_runs to confirm the run is active."
    )
}
