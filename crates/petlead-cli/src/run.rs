//! `petlead run`: scrape the configured sites and report per-site outcomes.

use std::process::ExitCode;

use petlead_core::ScrapeConfig;
use petlead_scraper::{
    build_jobs, OrchestratorSettings, ResultWriter, ScrapeOrchestrator, StrategyRegistry,
};
use tokio_util::sync::CancellationToken;

use crate::summary;

/// Conventional exit status for a run stopped by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

/// Scrape every enabled site, or only `site`.
///
/// # Errors
///
/// Returns an error if the site selection is invalid, a configured strategy
/// is unknown, or every job failed outright. Individual query failures and
/// single failed sites are reported in the summary, not propagated.
pub(crate) async fn run_scrape(
    config: &ScrapeConfig,
    site: Option<&str>,
    no_delay: bool,
) -> anyhow::Result<ExitCode> {
    let registry = StrategyRegistry::with_builtin();
    let jobs = build_jobs(config, &registry, site)?;
    if jobs.is_empty() {
        anyhow::bail!("no enabled sites configured");
    }

    let mut settings = OrchestratorSettings::from_config(config);
    if no_delay {
        settings = settings.without_delays();
    }
    let writer = ResultWriter::new(&config.output.directory);
    let orchestrator = ScrapeOrchestrator::new(settings, writer);

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_signal(cancel.clone()));

    println!("Scraping {} site(s)...", jobs.len());
    let summary = orchestrator.run(jobs, cancel).await;
    watcher.abort();

    for line in summary::render(&summary) {
        println!("{line}");
    }

    if summary.all_failed() {
        anyhow::bail!("all {} sites failed", summary.results.len());
    }
    if summary.any_cancelled() {
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    Ok(ExitCode::SUCCESS)
}

async fn cancel_on_signal(cancel: CancellationToken) {
    shutdown_signal().await;
    tracing::warn!("interrupt received, stopping after the current query");
    cancel.cancel();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
