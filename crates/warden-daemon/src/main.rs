//! # warden-daemon
//!
//! The Warden mediation server over stdio.
//!
//! Reads one JSON request object per line from stdin, dispatches it through
//! the gateway, and writes one JSON response object per line to stdout.
//! Logs go to stderr so they never interleave with the protocol.
//!
//! Startup refuses to serve when governance state is not trustworthy:
//!
//!   exit 10 — sandbox integrity check failed
//!   exit 20 — audit chain invalid
//!   exit 30 — halt file unreadable
//!   exit  1 — other fatal error
//!
//! ## Usage
//!
//! ```text
//! warden-daemon --workspace-root /path/to/repo --role EXECUTOR
//! ```
//!
//! The role may also come from the `WARDEN_ROLE` environment variable.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use warden_gateway::{env, ErrorBody, ToolRequest, ToolResponse, WardenServer};
use warden_session::Role;

/// Warden mediation server.
#[derive(Parser)]
#[command(name = "warden-daemon", about = "Policy-enforcing mediation server for governed repositories")]
struct Cli {
    /// Directory inside the governed repository (defaults to the cwd).
    #[arg(long, default_value = ".")]
    workspace_root: PathBuf,

    /// Process role: PLANNER, EXECUTOR, or OWNER. Falls back to WARDEN_ROLE.
    #[arg(long)]
    role: Option<String>,
}

fn resolve_role(cli_role: Option<&str>) -> Result<Role> {
    let raw = match cli_role {
        Some(raw) => raw.to_string(),
        None => env::read_env(env::ENV_ROLE)
            .ok_or_else(|| anyhow!("no role: pass --role or set {}", env::ENV_ROLE))?,
    };
    Role::parse(&raw).ok_or_else(|| anyhow!("invalid role '{}': expected PLANNER, EXECUTOR, or OWNER", raw))
}

#[tokio::main]
async fn main() {
    // Logs to stderr; stdout carries the wire protocol.
    let filter = env::read_env(env::ENV_LOG).unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let role = match resolve_role(cli.role.as_deref()) {
        Ok(role) => role,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            std::process::exit(1);
        }
    };

    let mut server = match WardenServer::new(&cli.workspace_root, role) {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "no governed repository");
            std::process::exit(1);
        }
    };

    tracing::info!(
        role = %server.role(),
        root = %server.config().workspace_root.display(),
        "warden daemon starting"
    );

    if let Err(err) = server.startup_check() {
        tracing::error!(error = %err, "startup integrity check failed");
        std::process::exit(err.exit_code());
    }

    if let Err(err) = serve(&mut server).await {
        tracing::error!(error = %err, "fatal i/o error");
        std::process::exit(1);
    }

    tracing::info!("warden daemon shutting down");
}

/// The stdio transport loop: one request per line, one response per line.
/// Requests are serialized in arrival order; the core is synchronous by
/// contract and this adapter supplies no additional concurrency.
async fn serve(server: &mut WardenServer) -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ToolRequest>(&line) {
            Ok(request) => server.dispatch(request),
            Err(err) => ToolResponse::err(
                None,
                ErrorBody {
                    code: "INVALID_INPUT_TYPE".to_string(),
                    message: format!("[transport] request is not a valid JSON object: {}", err),
                    details: None,
                },
            ),
        };

        let encoded = serde_json::to_string(&response)?;
        stdout.write_all(encoded.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}
