// src/logging.rs

//! Diagnostics go through `tracing`; this installs the stderr subscriber.
//!
//! Filter selection, first match wins:
//! 1. `--log-level` on the command line;
//! 2. `TASKWEAVE_LOG`, any `EnvFilter` directive (`debug`,
//!    `taskweave::engine=trace,info`, ...);
//! 3. `warn`.
//!
//! Task output owns stdout and the live frames redraw the terminal, so the
//! default stays quiet.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` flag is given.
pub const LOG_ENV: &str = "TASKWEAVE_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}

/// Filter for the given flag and raw `TASKWEAVE_LOG` value. An unparsable
/// environment directive falls back to the default instead of failing.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level.as_directive());
    }
    env.filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
