//! Console and file log layers with independent filters.

use clap::ValueEnum;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Name of the full log inside the log directory.
pub const FULL_LOG: &str = "full_log.log";

/// How much a log layer shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Nothing.
    None,
    /// Errors only.
    Errors,
    /// Warnings plus session results (turn outcomes, termination).
    Results,
    /// Everything at info.
    Info,
}

impl LogLevel {
    /// The `EnvFilter` directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::Errors => "error",
            Self::Results => "warn,colloquy_orch_local=info,colloquy=info",
            Self::Info => "info",
        }
    }
}

/// Install the global subscriber.
///
/// The console layer writes to stderr so it never interleaves with the
/// dialog on stdout; `debug` raises it to `debug` for the colloquy
/// crates. The file layer appends to `<log_dir>/full_log.log` without
/// ANSI codes and is skipped for [`LogLevel::None`].
pub fn init(console: LogLevel, file: LogLevel, debug: bool, log_dir: &Path) -> anyhow::Result<()> {
    let console_filter = if debug {
        EnvFilter::new("warn,colloquy=debug,colloquy_orch_local=debug,colloquy_graph=debug,colloquy_hooks=debug,colloquy_services=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console.directive()))
    };
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    if file == LogLevel::None {
        tracing_subscriber::registry().with(console_layer).try_init()?;
        return Ok(());
    }

    std::fs::create_dir_all(log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(FULL_LOG))?;
    let file_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .with_filter(EnvFilter::new(file.directive()));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_is_a_valid_filter() {
        for level in LogLevel::value_variants() {
            assert!(EnvFilter::try_new(level.directive()).is_ok(), "{level:?}");
        }
    }
}
