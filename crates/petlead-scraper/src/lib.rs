//! Scraping engine: per-site sessions, retries, location planning,
//! deduplication and CSV output.

pub mod dedup;
pub mod error;
pub mod locations;
pub mod orchestrator;
pub mod retry;
pub mod site;
pub mod strategies;
pub mod writer;

pub use dedup::{normalize_identity, Admission, DedupKey, RecordDeduplicator};
pub use error::{FetchError, RetryError, WriteError};
pub use locations::{LocationPlan, Queries};
pub use orchestrator::{
    JobStatus, OrchestratorSettings, RunResult, RunSummary, ScrapeOrchestrator,
};
pub use retry::{Attempted, RetryPolicy};
pub use site::{build_jobs, ScraperFactory, SessionSettings, SiteJob, SiteScraper, StrategyRegistry};
pub use strategies::{JsonFeed, JsonSearch};
pub use writer::ResultWriter;
