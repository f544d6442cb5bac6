use ai4all_core::Config;
use anyhow::Result;
use serde_json::Value;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

async fn get_json(client: &reqwest::Client, url: &str) -> Option<Value> {
    let response = client.get(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.json().await.ok()
}

pub async fn execute() -> Result<()> {
    let config = Config::load()?;
    let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;

    println!("ai4all status\n");

    let gateway_url = format!("http://{}:{}", config.server.host, config.server.port);
    match get_json(&client, &format!("{}/health", gateway_url)).await {
        Some(health) => {
            println!("Gateway: running at {}", gateway_url);
            if let Some(version) = health["version"].as_str() {
                println!("  version: {}", version);
            }
        }
        None => println!("Gateway: not running"),
    }

    let backend_up = get_json(&client, &format!("{}/tags", config.backend.url.trim_end_matches('/')))
        .await
        .is_some();
    println!(
        "Inference backend: {} ({})",
        if backend_up { "reachable" } else { "unreachable" },
        config.backend.url
    );

    match get_json(&client, &config.ledger.endpoint("/v1/tokens")).await {
        Some(balance) => println!("Node daemon: reachable, balance {}", balance["balance"]),
        None => println!("Node daemon: unreachable ({})", config.ledger.url),
    }

    if !backend_up {
        println!("\nRun `ollama serve` to start the inference backend.");
    }

    Ok(())
}
