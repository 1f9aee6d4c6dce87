use std::path::PathBuf;

use thiserror::Error;

/// Errors a [`crate::SiteScraper`] reports for one query or session.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no response within {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {url} (HTTP 429)")]
    RateLimited { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("parse error for {context}: {reason}")]
    Parse { context: String, reason: String },

    #[error("site structure incompatible: {0}")]
    Incompatible(String),

    /// Zero stores at the searched location. Not a failure.
    #[error("no results")]
    NoResults,

    #[error("session could not be started: {0}")]
    SessionInit(String),
}

impl FetchError {
    /// Returns `true` when the same query may succeed if tried again.
    ///
    /// Transient: navigation failures, timeouts, HTTP 429 and 5xx, and
    /// network-level `reqwest` failures (connect, timeout, body read).
    ///
    /// Permanent: parse failures, structure incompatibilities, other HTTP
    /// statuses, session failures and [`FetchError::NoResults`].
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Navigation { .. }
            | FetchError::Timeout { .. }
            | FetchError::RateLimited { .. } => true,
            FetchError::UnexpectedStatus { status, .. } => *status >= 500,
            FetchError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_body()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            FetchError::Parse { .. }
            | FetchError::Incompatible(_)
            | FetchError::NoResults
            | FetchError::SessionInit(_) => false,
        }
    }
}

/// Outcome of a query that did not produce records.
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("permanent failure on attempt {attempts}: {source}")]
    Permanent {
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: FetchError,
    },
}

impl RetryError {
    /// The underlying error of the final attempt.
    #[must_use]
    pub fn last_error(&self) -> &FetchError {
        match self {
            RetryError::Permanent { source: e, .. } | RetryError::Exhausted { last: e, .. } => e,
        }
    }

    /// Attempts spent before giving up, first try included.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Failures persisting a site's records.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("could not find a free file name for {path} after {tries} tries")]
    NameExhausted { path: PathBuf, tries: u32 },
}
