mod assignments;
mod config;
mod db;
mod error;
mod identity;
mod ipc;
mod ledger;
mod policy;
mod reports;
mod roster;

use anyhow::Context;
use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(filter: Option<&str>) -> anyhow::Result<()> {
    let filter = match filter {
        Some(f) => {
            EnvFilter::try_new(f).with_context(|| format!("invalid log filter {:?}", f))?
        }
        None => EnvFilter::new("info"),
    };
    // stdout carries the protocol; logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cfg = config::Config::from_env()?;
    if cfg.show_help {
        print!("{}", config::USAGE);
        return Ok(());
    }
    init_tracing(cfg.log_filter.as_deref())?;

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
    };
    if let Some(path) = cfg.workspace {
        let conn = db::open_db(&path)
            .with_context(|| format!("failed to open workspace {}", path.to_string_lossy()))?;
        info!(workspace = %path.to_string_lossy(), "workspace opened");
        state.workspace = Some(path);
        state.db = Some(conn);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to echo back.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        debug!(id = %req.id, method = %req.method, "request");
        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    info!("shutting down");
    Ok(())
}
