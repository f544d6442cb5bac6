use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gateway server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Inference backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Usage ledger / node daemon settings
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins, `*` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the inference daemon API; chat lives at `{url}/chat`
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Generation can be slow, so this is long
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,

    /// Timeout for the reachability probe behind `/health`
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the node daemon that keeps the token ledger
    #[serde(default = "default_ledger_url")]
    pub url: String,

    /// Timeout for ledger and telemetry calls
    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,

    /// Pending usage reports held before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_backend_url() -> String {
    "http://localhost:11434/api".to_string()
}

fn default_backend_timeout() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_ledger_url() -> String {
    "http://127.0.0.1:7070".to_string()
}

fn default_ledger_timeout() -> u64 {
    2
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_backend_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: default_ledger_url(),
            timeout_secs: default_ledger_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.url.trim_end_matches('/'))
    }
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }
}

impl Config {
    /// Get the base directory: ~/.config/ai4all/
    pub fn base_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("USERPROFILE").map(PathBuf::from))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(home.join(".config").join("ai4all"))
    }

    /// Get the config file path: ~/.config/ai4all/config.toml
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.toml"))
    }

    /// Load config from the default location, then apply `AI4ALL_*` overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("AI4ALL_OLLAMA_URL") {
            self.backend.url = url;
        }
        if let Some(url) = lookup("AI4ALL_NODE_API_URL") {
            self.ledger.url = url;
        }
        if let Some(origins) = lookup("AI4ALL_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(host) = lookup("AI4ALL_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("AI4ALL_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid AI4ALL_PORT: {}", port))?;
        }
        Ok(())
    }
}
