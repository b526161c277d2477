//! Varanus entrypoint: HTTP scan server or one-shot scans from the shell.
//!
//! Usage:
//!   varanus serve
//!   varanus serve --bind 0.0.0.0:8000
//!   varanus scan processes
//!   varanus scan files /opt/deploy --mode quantum
//!   varanus scan logs
//!
//! One-shot scans print their records to stdout as a single JSON line;
//! diagnostics and logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use varanus::engine::{ScanEngine, ScanMode};
use varanus::logging::StructuredLogger;
use varanus::model::Scorer;
use varanus::{server, EngineConfig};

#[derive(Parser)]
#[command(name = "varanus")]
#[command(about = "Host-based threat detection engine")]
struct Cli {
    /// Config file (default: VARANUS_CONFIG_PATH, then ./config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP scan server
    Serve {
        /// Listen address, overriding the configured one
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run one scan and print its records to stdout
    Scan {
        #[command(subcommand)]
        target: ScanTarget,
    },
}

#[derive(Subcommand)]
enum ScanTarget {
    /// Scan the running process table
    Processes {
        #[arg(long, default_value = "classic")]
        mode: String,
    },
    /// Scan a file or a directory tree
    Files {
        path: PathBuf,
        #[arg(long, default_value = "classic")]
        mode: String,
    },
    /// Scan recent security audit log events
    Logs {
        #[arg(long, default_value = "classic")]
        mode: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| std::env::var("VARANUS_CONFIG_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let config = EngineConfig::load(&config_path);
    config.validate()?;

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(config = %config_path.display(), "varanus starting");

    let scorer = Scorer::load(&config.model_path, &config.scaler_path)
        .context("failed to load scoring artifacts")?;
    let engine = Arc::new(ScanEngine::new(&config, Arc::new(scorer)));

    match cli.command {
        Command::Serve { bind } => {
            let addr: SocketAddr = bind
                .as_deref()
                .unwrap_or(&config.server.bind_addr)
                .parse()
                .context("invalid bind address")?;
            server::serve(addr, engine).await?;
            info!("varanus stopping");
        }
        Command::Scan { target } => {
            let outcome = match target {
                ScanTarget::Processes { mode } => {
                    engine.scan_processes(ScanMode::from_name(&mode))?
                }
                ScanTarget::Files { path, mode } => {
                    engine.scan_files(&path, ScanMode::from_name(&mode))?
                }
                ScanTarget::Logs { mode } => engine.scan_logs(ScanMode::from_name(&mode))?,
            };
            let (records, diagnostics) = outcome.into_parts();
            for diagnostic in &diagnostics {
                warn!(kind = ?diagnostic.kind, detail = %diagnostic.detail, "scan degraded");
            }
            StructuredLogger::emit_json(&records, &mut std::io::stdout());
        }
    }

    Ok(())
}
