//! ai4all_core - Core library for the ai4all gateway
//!
//! This crate provides:
//! - Gateway configuration
//! - The public-to-backend model registry
//! - Chat message translation and request validation
//! - Word-count token estimation and usage cost
//! - GPU and host telemetry probes

pub mod config;
pub mod gpu;
pub mod messages;
pub mod registry;
pub mod request;
pub mod system;
pub mod tokens;

pub use config::Config;
pub use messages::{translate, ChatMessage, Role, Translated};
pub use registry::{ModelCategory, ModelEntry, ModelRegistry};
pub use request::{CompletionRequest, ValidationError};
pub use tokens::{estimate, usage_cost, Usage};
