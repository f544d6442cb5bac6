mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ai4all")]
#[command(author, version, about = "OpenAI-compatible gateway for community GPU nodes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Config file to load instead of the default
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show gateway, backend and ledger status
    Status,

    /// Show detected GPUs
    Gpu,

    /// View or set configuration
    Config {
        /// Config key (e.g., "server.port", "backend.url")
        key: Option<String>,

        /// Value to set (if omitted, shows current value)
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host, config } => {
            commands::serve::execute(config.as_deref(), host, port).await?;
        }
        Commands::Status => {
            commands::status::execute().await?;
        }
        Commands::Gpu => {
            commands::gpu::execute().await?;
        }
        Commands::Config { key, value } => {
            commands::config::execute(key.as_deref(), value.as_deref()).await?;
        }
    }

    Ok(())
}
