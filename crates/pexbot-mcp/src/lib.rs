//! `pexbot-mcp`: pex.bot trading simulation for MCP agents.
//!
//! Provides:
//! - **Tools**: 16 tool definitions covering accounts, markets, orders, and the autonomous league
//! - **Resources / Prompts**: read-only market views and trading prompt templates
//! - **Client**: Async HTTP client for the pex.bot REST API
//! - **Auth**: API key → session token → auto-login credential resolution
//! - **Registration**: proof-of-work challenge solving and device fingerprints
//! - **Server**: line-delimited JSON-RPC over stdio

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod pow;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;

// Re-exports for convenience
pub use auth::{AuthMode, AuthResolver, Credential};
pub use client::{PexbotClient, Registration, RegistrationRequest};
pub use config::{Config, LoginCredentials, DEFAULT_API_URL};
pub use error::{PexbotError, PexbotResult};
pub use fingerprint::Fingerprint;
pub use pow::{solve, Solver};
pub use server::PexbotServer;
pub use tools::{execute_tool, tool_definitions, ToolOutput};
