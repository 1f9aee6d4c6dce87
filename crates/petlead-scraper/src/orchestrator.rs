//! Top-level scraping control loop.
//!
//! Every [`SiteJob`] gets its own session, location plan and
//! [`RecordDeduplicator`], and produces one [`RunResult`]. Jobs share no
//! mutable state: a job that fails (session start-up, panic inside the
//! scraper) is recorded as failed and the others carry on. Results come back
//! in job order whatever `max_concurrent_sites` is.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use petlead_core::{ScrapeConfig, SearchQuery, StoreRecord};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::dedup::RecordDeduplicator;
use crate::error::{FetchError, RetryError, WriteError};
use crate::locations::LocationPlan;
use crate::retry::{Attempted, RetryPolicy};
use crate::site::{SessionSettings, SiteJob, SiteScraper};
use crate::writer::ResultWriter;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything the orchestrator needs from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub retry: RetryPolicy,
    /// Pause between consecutive queries of one job.
    pub request_delay: Duration,
    /// Upper bound for opening a session and for each fetch attempt.
    pub query_timeout: Duration,
    pub max_concurrent_sites: usize,
    pub session: SessionSettings,
    pub cities: Vec<String>,
    pub radius_km: u32,
}

impl OrchestratorSettings {
    #[must_use]
    pub fn from_config(config: &ScrapeConfig) -> Self {
        let scraping = &config.scraping;
        Self {
            retry: RetryPolicy::new(scraping.retry_attempts, scraping.retry_base_delay()),
            request_delay: scraping.request_delay(),
            query_timeout: scraping.request_timeout(),
            max_concurrent_sites: scraping.max_concurrent_sites,
            session: SessionSettings {
                request_timeout: scraping.request_timeout(),
                user_agent: scraping.user_agent.clone(),
            },
            cities: config.search_locations.major_cities.clone(),
            radius_km: config.search_locations.radius_km,
        }
    }

    /// Same settings with every scheduling pause removed.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.request_delay = Duration::ZERO;
        self.retry = RetryPolicy::new(self.retry.max_attempts(), Duration::ZERO);
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Final state of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Every query was attempted. Individual queries may still have failed.
    Completed,
    /// The job could not run: the session failed to start or was lost, or
    /// the scraper panicked.
    Failed { reason: String },
    /// Stopped between queries on request.
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Failed { reason } => write!(f, "failed: {reason}"),
            JobStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Outcome of one site job.
#[derive(Debug)]
pub struct RunResult {
    pub site_id: String,
    pub site_name: String,
    pub status: JobStatus,
    /// Deduplicated records, in first-seen order.
    pub records: Vec<StoreRecord>,
    /// Records returned by the scraper before deduplication.
    pub raw_records: usize,
    pub queries_attempted: usize,
    /// Queries that ended in an error after retries.
    pub queries_failed: usize,
    pub retries: u32,
    /// Records folded into an already-seen store.
    pub merged: usize,
    pub elapsed: Duration,
    pub output: Option<PathBuf>,
    /// Set when the records could not be persisted. They stay in `records`.
    pub write_error: Option<WriteError>,
}

impl RunResult {
    fn new(job: &SiteJob) -> Self {
        Self {
            site_id: job.id.clone(),
            site_name: job.name.clone(),
            status: JobStatus::Completed,
            records: Vec::new(),
            raw_records: 0,
            queries_attempted: 0,
            queries_failed: 0,
            retries: 0,
            merged: 0,
            elapsed: Duration::ZERO,
            output: None,
            write_error: None,
        }
    }

    #[must_use]
    pub fn unique(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status, JobStatus::Failed { .. })
    }
}

/// Results of one orchestrator run, in job order.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub results: Vec<RunResult>,
}

impl RunSummary {
    /// `true` when there was at least one job and every job failed outright.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(RunResult::is_failed)
    }

    #[must_use]
    pub fn any_cancelled(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.status == JobStatus::Cancelled)
    }

    #[must_use]
    pub fn total_unique(&self) -> usize {
        self.results.iter().map(RunResult::unique).sum()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct ScrapeOrchestrator {
    settings: OrchestratorSettings,
    writer: ResultWriter,
}

/// How a job's query loop ended, short of a panic.
enum LoopEnd {
    Finished,
    Cancelled,
    /// The session reported it can no longer serve queries.
    SessionLost(String),
}

impl ScrapeOrchestrator {
    #[must_use]
    pub fn new(settings: OrchestratorSettings, writer: ResultWriter) -> Self {
        Self { settings, writer }
    }

    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Run every job, at most `max_concurrent_sites` at a time.
    ///
    /// Cancelling `cancel` stops each running job before its next query;
    /// jobs that have not started yet are reported as cancelled without
    /// opening a session.
    pub async fn run(&self, jobs: Vec<SiteJob>, cancel: CancellationToken) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let max_concurrent = self.settings.max_concurrent_sites.max(1);

        tracing::info!(
            %run_id,
            jobs = jobs.len(),
            max_concurrent,
            "scrape run started"
        );

        let results: Vec<RunResult> = stream::iter(jobs)
            .map(|job| self.run_job(job, started_at, &cancel))
            .buffered(max_concurrent)
            .collect()
            .await;

        tracing::info!(
            %run_id,
            unique = results.iter().map(RunResult::unique).sum::<usize>(),
            failed = results.iter().filter(|r| r.is_failed()).count(),
            "scrape run finished"
        );

        RunSummary {
            run_id,
            started_at,
            results,
        }
    }

    async fn run_job(
        &self,
        job: SiteJob,
        run_started: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> RunResult {
        let started = Instant::now();
        let mut result = RunResult::new(&job);

        if cancel.is_cancelled() {
            tracing::info!(site = %job.id, "job skipped: run cancelled");
            result.status = JobStatus::Cancelled;
            return result;
        }

        tracing::info!(site = %job.id, strategy = job.strategy.id(), "job started");

        let session = match self.open_session(&job).await {
            Ok(session) => session,
            Err(reason) => {
                tracing::error!(site = %job.id, error = %reason, "session start-up failed");
                result.status = JobStatus::Failed { reason };
                result.elapsed = started.elapsed();
                return result;
            }
        };

        let mut dedup = RecordDeduplicator::new();
        let outcome = AssertUnwindSafe(self.drive_queries(
            &job,
            session.as_ref(),
            cancel,
            &mut dedup,
            &mut result,
        ))
        .catch_unwind()
        .await;

        close_session(&job, session.as_ref()).await;

        result.raw_records = dedup.received();
        result.merged = dedup.merged();
        result.records = dedup.into_records();

        match outcome {
            Ok(LoopEnd::Finished) => {}
            Ok(LoopEnd::Cancelled) => {
                tracing::info!(site = %job.id, "job cancelled between queries");
                result.status = JobStatus::Cancelled;
            }
            Ok(LoopEnd::SessionLost(reason)) => {
                tracing::error!(site = %job.id, error = %reason, "job aborted");
                result.status = JobStatus::Failed { reason };
            }
            Err(panic) => {
                let reason = format!("scraper panicked: {}", panic_message(panic.as_ref()));
                tracing::error!(site = %job.id, error = %reason, "job aborted");
                result.status = JobStatus::Failed { reason };
            }
        }

        if !result.is_failed() {
            match self.writer.write(&job.id, run_started, &result.records) {
                Ok(path) => result.output = path,
                Err(e) => {
                    tracing::error!(site = %job.id, error = %e, "failed to write results");
                    result.write_error = Some(e);
                }
            }
        }

        result.elapsed = started.elapsed();
        tracing::info!(
            site = %job.id,
            status = %result.status,
            queries = result.queries_attempted,
            raw = result.raw_records,
            unique = result.unique(),
            merged = result.merged,
            errors = result.queries_failed,
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "job finished"
        );
        result
    }

    async fn open_session(&self, job: &SiteJob) -> Result<Box<dyn SiteScraper>, String> {
        let limit = self.settings.query_timeout;
        let opening = tokio::time::timeout(limit, job.strategy.open(job, &self.settings.session));
        match AssertUnwindSafe(opening).catch_unwind().await {
            Ok(Ok(Ok(session))) => Ok(session),
            Ok(Ok(Err(e))) => Err(format!("session could not be started: {e}")),
            Ok(Err(_)) => Err(format!(
                "session start-up timed out after {}s",
                limit.as_secs()
            )),
            Err(panic) => Err(format!(
                "session start-up panicked: {}",
                panic_message(panic.as_ref())
            )),
        }
    }

    async fn drive_queries(
        &self,
        job: &SiteJob,
        session: &dyn SiteScraper,
        cancel: &CancellationToken,
        dedup: &mut RecordDeduplicator,
        result: &mut RunResult,
    ) -> LoopEnd {
        let plan = LocationPlan::new(
            self.settings.cities.clone(),
            self.settings.radius_km,
            session.location_independent(),
        );
        if plan.is_empty() {
            tracing::info!(site = %job.id, "no search locations configured");
        }

        for (index, query) in plan.iter().enumerate() {
            if cancel.is_cancelled() {
                return LoopEnd::Cancelled;
            }
            if index > 0 && !self.settings.request_delay.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => return LoopEnd::Cancelled,
                    () = tokio::time::sleep(self.settings.request_delay) => {}
                }
            }

            result.queries_attempted += 1;
            match self.fetch_with_retry(session, &query).await {
                Ok(Attempted { value, retries }) => {
                    result.retries += retries;
                    let found = value.len();
                    let merged_before = dedup.merged();
                    dedup.extend(value);
                    tracing::info!(
                        site = %job.id,
                        city = query.label(),
                        radius_km = query.radius_km(),
                        records = found,
                        merged = dedup.merged() - merged_before,
                        retries,
                        "query finished"
                    );
                }
                Err(RetryError::Permanent {
                    source: FetchError::SessionInit(reason),
                    ..
                }) => {
                    result.queries_failed += 1;
                    return LoopEnd::SessionLost(format!(
                        "session lost during '{}': {reason}",
                        query.label()
                    ));
                }
                Err(e) => {
                    result.queries_failed += 1;
                    result.retries += e.attempts().saturating_sub(1);
                    tracing::warn!(
                        site = %job.id,
                        city = query.label(),
                        radius_km = query.radius_km(),
                        attempts = e.attempts(),
                        error = %e,
                        "query failed"
                    );
                }
            }
        }
        LoopEnd::Finished
    }

    /// One query under the retry policy; each attempt is time-boxed and an
    /// empty location counts as success.
    async fn fetch_with_retry(
        &self,
        session: &dyn SiteScraper,
        query: &SearchQuery,
    ) -> Result<Attempted<Vec<StoreRecord>>, RetryError> {
        let limit = self.settings.query_timeout;
        self.settings
            .retry
            .attempt(move || async move {
                match tokio::time::timeout(limit, session.fetch(query)).await {
                    Ok(Err(FetchError::NoResults)) => Ok(Vec::new()),
                    Ok(other) => other,
                    Err(_) => Err(FetchError::Timeout {
                        after_secs: limit.as_secs(),
                    }),
                }
            })
            .await
    }
}

/// Release the session; a panicking `close` is logged and otherwise ignored.
async fn close_session(job: &SiteJob, session: &dyn SiteScraper) {
    match AssertUnwindSafe(session.close()).catch_unwind().await {
        Ok(()) => tracing::debug!(site = %job.id, "session closed"),
        Err(panic) => tracing::error!(
            site = %job.id,
            error = %panic_message(panic.as_ref()),
            "session close panicked"
        ),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
