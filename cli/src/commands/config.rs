use ai4all_core::Config;
use anyhow::Result;
use std::path::Path;

pub async fn execute(key: Option<&str>, value: Option<&str>) -> Result<()> {
    match (key, value) {
        // Show all config, environment overrides applied
        (None, None) => {
            let config = Config::load()?;
            println!("Configuration file: {:?}\n", Config::config_path()?);
            print!("{}", config.to_toml()?);
        }

        // Get a specific key
        (Some(key), None) => {
            let config = Config::load()?;
            println!("{}", get_config_value(&config, key)?);
        }

        // Set a specific key
        (Some(key), Some(value)) => {
            set_in_file(&Config::config_path()?, key, value)?;
            println!("Set {} = {}", key, value);
        }

        (None, Some(_)) => anyhow::bail!("A key is required to set a value"),
    }

    Ok(())
}

/// Edit one key in the file itself; `AI4ALL_*` overrides never get persisted.
fn set_in_file(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load_from(path)?;
    set_config_value(&mut config, key, value)?;
    config.save_to(path)
}

fn get_config_value(config: &Config, key: &str) -> Result<String> {
    match key {
        "server.host" => Ok(config.server.host.clone()),
        "server.port" => Ok(config.server.port.to_string()),
        "server.cors_origins" => Ok(config.server.cors_origins.join(",")),
        "backend.url" => Ok(config.backend.url.clone()),
        "backend.timeout_secs" => Ok(config.backend.timeout_secs.to_string()),
        "backend.probe_timeout_secs" => Ok(config.backend.probe_timeout_secs.to_string()),
        "ledger.url" => Ok(config.ledger.url.clone()),
        "ledger.timeout_secs" => Ok(config.ledger.timeout_secs.to_string()),
        "ledger.queue_capacity" => Ok(config.ledger.queue_capacity.to_string()),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "server.host" => config.server.host = value.to_string(),
        "server.port" => config.server.port = value.parse()?,
        "server.cors_origins" => {
            config.server.cors_origins = value
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect()
        }
        "backend.url" => config.backend.url = value.to_string(),
        "backend.timeout_secs" => config.backend.timeout_secs = value.parse()?,
        "backend.probe_timeout_secs" => config.backend.probe_timeout_secs = value.parse()?,
        "ledger.url" => config.ledger.url = value.to_string(),
        "ledger.timeout_secs" => config.ledger.timeout_secs = value.parse()?,
        "ledger.queue_capacity" => config.ledger.queue_capacity = value.parse()?,
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
    Ok(())
}
