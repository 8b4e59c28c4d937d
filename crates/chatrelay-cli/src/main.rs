//! `chatrelay` binary: relay browser chat over WebSocket to a streaming LLM API.
//!
//! Configuration is resolved before anything is bound: a missing API key
//! exits with a diagnostic and no listener.

use anyhow::Context;
use chatrelay_api::server::run_server;
use chatrelay_types::config::{env_lookup, ApiKey, RelayConfig};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "chatrelay",
    version,
    about = "Stream language-model replies to browser chat clients over WebSocket"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Interface to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on. Overrides `PORT` and the config file.
    #[arg(long, short)]
    port: Option<u16>,

    /// Directory with the chat page and static assets.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

/// Defaults, then config file, then environment, then flags.
fn resolve_config<F>(cli: &Cli, lookup: F) -> anyhow::Result<(RelayConfig, ApiKey)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = RelayConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .apply_env(&lookup)?;

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = &cli.static_dir {
        config.static_dir = dir.clone();
    }

    let api_key = config.resolve_api_key(&lookup)?;
    Ok((config, api_key))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, api_key) = match resolve_config(&cli, env_lookup) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.log_json);

    if let Err(e) = run_server(&config, api_key).await {
        error!(error = %e, "Server exited with error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
