use ai4all_core::Config;
use anyhow::Result;
use std::path::Path;

pub async fn execute(config_path: Option<&Path>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => Config::load()?,
    };
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("Starting ai4all gateway...");
    println!("Listening on http://{}:{}", config.server.host, config.server.port);
    println!("Inference backend: {}", config.backend.url);
    println!("Node daemon: {}", config.ledger.url);
    println!("\nAPI endpoints:");
    println!("  GET  /health              - Health check");
    println!("  GET  /v1/models           - List models");
    println!("  POST /v1/chat/completions - Chat completion (OpenAI-compatible)");
    println!("  POST /v1/tokens/starter   - One-time starter grant");
    println!("  GET  /v1/tokens/balance   - Ledger balance");
    println!("  GET  /v1/gpu              - GPU detection");
    println!("  GET  /v1/system/stats     - Host utilisation");
    println!("  GET  /v1/node/status      - Node daemon status");
    println!("\nPress Ctrl+C to stop.\n");

    ai4all_gateway::run_server(config).await?;

    Ok(())
}
