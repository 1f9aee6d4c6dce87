pub mod config;
pub mod record;

pub use config::{
    load_config, load_config_with, parse_config, LoggingConfig, OutputConfig, ScrapeConfig,
    ScrapingConfig, SearchLocations, SiteConfig,
};
pub use record::{
    is_blank, Provenance, SearchQuery, StoreRecord, NATIONWIDE_LABEL, PROVENANCE_COLUMNS,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config validation failed: {0}")]
    Validation(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("site '{site}' uses unknown strategy '{strategy}'")]
    UnknownStrategy { site: String, strategy: String },

    #[error("site '{0}' is not configured")]
    UnknownSite(String),

    #[error("site '{0}' is disabled in configuration")]
    SiteDisabled(String),
}
