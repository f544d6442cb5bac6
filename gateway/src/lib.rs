//! ai4all_gateway - OpenAI-compatible HTTP gateway
//!
//! This crate provides the server that:
//! - Translates OpenAI chat completions into the inference daemon's protocol
//! - Bridges the daemon's line-delimited stream into server-sent events
//! - Reports token usage to the node ledger without blocking requests
//! - Hands out one starter grant per session

pub mod accounting;
pub mod api;
pub mod backend;
pub mod completion;
pub mod error;
pub mod grants;
pub mod ledger;
pub mod openai;
pub mod server;
pub mod state;
pub mod stream;

pub use error::GatewayError;
pub use server::{build_app, run_server};
pub use state::AppState;
