use anyhow::{anyhow, Result};
use std::path::PathBuf;

pub const USAGE: &str = "attendd - attendance ledger sidecar

Reads one JSON request per line on stdin, writes one JSON response per line on stdout.

USAGE:
  attendd [--workspace PATH] [--log FILTER]

OPTIONS:
  --workspace PATH   Open this workspace at startup (env: ATTENDD_WORKSPACE)
  --log FILTER       tracing filter directive, e.g. debug or attendd=trace
                     (env: ATTENDD_LOG, then RUST_LOG, default info)
  -h, --help         Print this help
";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: Option<String>,
    pub show_help: bool,
}

fn flag_value(args: &[String], name: &str) -> Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    match args.get(pos + 1) {
        Some(v) if !v.starts_with("--") => Ok(Some(v.clone())),
        _ => Err(anyhow!("{} requires a value", name)),
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Config {
    /// Flags win over environment variables.
    pub fn resolve<F>(args: &[String], env: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let show_help = args.iter().any(|a| a == "--help" || a == "-h");
        let workspace = non_empty(flag_value(args, "--workspace")?)
            .or_else(|| non_empty(env("ATTENDD_WORKSPACE")))
            .map(PathBuf::from);
        let log_filter = non_empty(flag_value(args, "--log")?)
            .or_else(|| non_empty(env("ATTENDD_LOG")))
            .or_else(|| non_empty(env("RUST_LOG")));
        Ok(Config {
            workspace,
            log_filter,
            show_help,
        })
    }

    pub fn from_env() -> Result<Config> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Config::resolve(&args, |k| std::env::var(k).ok())
    }
}
