use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use jira_mcp::config::{self, JiraConfig};
use jira_mcp::jira::JiraClient;
use jira_mcp::mcp::server::MCPServer;
use jira_mcp::mcp::tools::{ExecutionContext, ToolRegistry};
use jira_mcp::mcp::transport::StdioTransport;

/// MCP server exposing Jira issue tracking over stdio
#[derive(Debug, Parser)]
#[command(name = "jira-mcp", version, about)]
struct Args {
    /// Settings file to load instead of .env.jira / .env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Log filter directive; RUST_LOG takes precedence
    #[arg(long, value_name = "FILTER", default_value = "info")]
    log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Base directory for relative attachment paths and downloads
    #[arg(long, value_name = "PATH")]
    working_dir: Option<PathBuf>,
}

/// Stdout carries the protocol, so logs go to stderr or a file.
/// The returned guard flushes the file writer when dropped.
fn init_logging(level: &str, log_file: Option<&PathBuf>) -> std::io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let working_dir = match args.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    config::load_settings_file(args.env_file.as_deref(), &working_dir)?;
    let jira_config = JiraConfig::from_env()?;
    info!(
        "Connecting to {} with {} auth",
        jira_config.base_url,
        jira_config.auth.name()
    );

    let client = JiraClient::new(&jira_config)?;
    let context = ExecutionContext::new(Arc::new(client), working_dir)
        .with_max_attachment_size(jira_config.max_attachment_bytes);

    let registry = Arc::new(ToolRegistry::with_jira_tools()?);
    let server = MCPServer::new(registry, context);

    info!("Starting {} v{} on stdio", jira_mcp::mcp::SERVER_NAME, jira_mcp::mcp::SERVER_VERSION);
    server.serve(Box::new(StdioTransport::new())).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let guard = match init_logging(&args.log_level, args.log_file.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to open log file: {}", e);
            std::process::exit(1);
        }
    };

    let result = run(args).await;
    if let Err(e) = &result {
        error!("Server failed: {}", e);
    }

    drop(guard);
    if result.is_err() {
        std::process::exit(1);
    }
}
