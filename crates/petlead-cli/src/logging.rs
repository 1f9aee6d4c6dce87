//! Tracing subscriber set-up for the binary.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context as _;
use petlead_core::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive in effect: `--verbose` beats `RUST_LOG`, which beats the
/// configured level.
pub(crate) fn filter_directive(
    configured: &str,
    verbose: bool,
    rust_log: Option<&str>,
) -> String {
    if verbose {
        return "debug".to_string();
    }
    match rust_log.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => configured.to_string(),
    }
}

/// Install the global subscriber: human-readable output on stderr, plus an
/// appending plain-text copy when `logging.file` is set.
pub(crate) fn init(config: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(&config.level, verbose, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{directive}'"))?;

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log directory {}", parent.display())
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}
