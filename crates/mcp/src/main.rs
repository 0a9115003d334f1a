//! toolwire-mcp - MCP tool server speaking newline-delimited JSON-RPC on stdio.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use toolwire_mcp::config::ServerConfig;
use toolwire_mcp::server;
use toolwire_mcp::tools::build_registry;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "toolwire-mcp", version, about)]
struct Cli {
    /// JSON configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "TOOLWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format (logs always go to stderr).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Maximum number of requests in flight; 1 serializes handling.
    #[arg(long)]
    pipeline_depth: Option<usize>,

    /// Print the registered tools as JSON and exit.
    #[arg(long)]
    list_tools: bool,
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match cli.log_format {
        LogFormat::Json => builder.json().with_target(true).init(),
        LogFormat::Text => builder.with_ansi(false).init(),
    }
}

fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(depth) = cli.pipeline_depth {
        config.pipeline_depth = depth;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = load_config(&cli)?;
    tracing::debug!(?config, "configuration loaded");

    if cli.list_tools {
        let registry = build_registry(&config)?;
        let tools = registry.list();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "tools": tools }))?
        );
        return Ok(());
    }

    server::serve(&config, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
