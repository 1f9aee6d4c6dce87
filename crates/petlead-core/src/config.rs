//! Run configuration: the YAML document listing target sites, search
//! locations, output location, scraping limits and logging.
//!
//! Loading is fail-fast. Any missing required field, malformed value or
//! invalid override is reported as a [`ConfigError`] before a single request
//! is made.

use std::collections::HashSet;
use std::env::VarError;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::ConfigError;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    /// Site id -> site settings, in document order.
    pub websites: IndexMap<String, SiteConfig>,
    pub search_locations: SearchLocations,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scraping: ScrapingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Display name, written into every record as `source_website`.
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub enabled: bool,
    /// Identifier of the scraping strategy in the strategy registry.
    pub strategy: String,
    /// Data endpoint when it differs from the public locator page.
    pub endpoint: Option<String>,
    /// Dot-separated key path to the record array inside a JSON response.
    pub records_path: Option<String>,
}

impl SiteConfig {
    /// The URL strategies should request data from.
    #[must_use]
    pub fn data_url(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchLocations {
    #[serde(default)]
    pub major_cities: Vec<String>,
    pub radius_km: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Maximum attempts per query, first try included.
    pub retry_attempts: u32,
    pub retry_base_delay_secs: u64,
    /// Pause between consecutive queries against the same site.
    pub delay_between_requests: u64,
    pub request_timeout_secs: u64,
    pub max_concurrent_sites: usize,
    pub user_agent: String,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_base_delay_secs: 2,
            delay_between_requests: 2,
            request_timeout_secs: 30,
            max_concurrent_sites: 1,
            user_agent: "petlead/0.1 (retailer-leads)".to_string(),
        }
    }
}

impl ScrapingConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.delay_between_requests)
    }

    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_secs(self.retry_base_delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Optional log file; stderr output is always on.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

impl ScrapeConfig {
    /// Enabled sites in document order.
    pub fn enabled_sites(&self) -> impl Iterator<Item = (&str, &SiteConfig)> {
        self.websites
            .iter()
            .filter(|(_, site)| site.enabled)
            .map(|(id, site)| (id.as_str(), site))
    }

    /// Look up a site that must exist and be enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownSite`] or [`ConfigError::SiteDisabled`].
    pub fn enabled_site(&self, id: &str) -> Result<&SiteConfig, ConfigError> {
        let site = self
            .websites
            .get(id)
            .ok_or_else(|| ConfigError::UnknownSite(id.to_string()))?;
        if !site.enabled {
            return Err(ConfigError::SiteDisabled(id.to_string()));
        }
        Ok(site)
    }
}

/// Load the configuration file at `path`, honouring `.env` and process
/// environment overrides.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, an override
/// is malformed, or validation fails.
pub fn load_config(path: &Path) -> Result<ScrapeConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_config_with(path, |key| std::env::var(key))
}

/// Load the configuration file at `path` using `lookup` for env overrides.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_with<F>(path: &Path, lookup: F) -> Result<ScrapeConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    build_config(&content, lookup)
}

/// Parse, override and validate a configuration document.
///
/// Decoupled from the filesystem and the process environment so tests can
/// drive it with literal YAML and a `HashMap` lookup.
fn build_config<F>(content: &str, lookup: F) -> Result<ScrapeConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let mut config = parse_config(content)?;
    apply_env_overrides(&mut config, lookup)?;
    config.logging.level = config.logging.level.to_lowercase();
    validate_config(&config)?;
    Ok(config)
}

/// Parse a YAML document without overrides or validation.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed YAML or missing required fields.
pub fn parse_config(content: &str) -> Result<ScrapeConfig, ConfigError> {
    Ok(serde_yaml::from_str(content)?)
}

fn apply_env_overrides<F>(config: &mut ScrapeConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let parse_u64 = |var: &str, raw: &str| -> Result<u64, ConfigError> {
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    if let Ok(dir) = lookup("PETLEAD_OUTPUT_DIR") {
        config.output.directory = PathBuf::from(dir);
    }
    if let Ok(level) = lookup("PETLEAD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(raw) = lookup("PETLEAD_REQUEST_TIMEOUT_SECS") {
        config.scraping.request_timeout_secs = parse_u64("PETLEAD_REQUEST_TIMEOUT_SECS", &raw)?;
    }
    if let Ok(raw) = lookup("PETLEAD_MAX_CONCURRENT_SITES") {
        let value = parse_u64("PETLEAD_MAX_CONCURRENT_SITES", &raw)?;
        config.scraping.max_concurrent_sites =
            usize::try_from(value).map_err(|e| ConfigError::InvalidEnvVar {
                var: "PETLEAD_MAX_CONCURRENT_SITES".to_string(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

fn validate_config(config: &ScrapeConfig) -> Result<(), ConfigError> {
    if config.websites.is_empty() {
        return Err(ConfigError::Validation(
            "at least one website must be configured".to_string(),
        ));
    }

    for (id, site) in &config.websites {
        if !is_site_slug(id) {
            return Err(ConfigError::Validation(format!(
                "site id '{id}' must contain only lowercase letters, digits, '-' or '_'"
            )));
        }
        if site.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{id}' has an empty name"
            )));
        }
        if site.strategy.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{id}' has an empty strategy"
            )));
        }
        let urls = [
            ("url", Some(site.url.as_str())),
            ("endpoint", site.endpoint.as_deref()),
        ];
        for (field, value) in urls {
            if let Some(value) = value {
                if !(value.starts_with("https://") || value.starts_with("http://")) {
                    return Err(ConfigError::Validation(format!(
                        "site '{id}' has invalid {field} '{value}'; must start with http:// or https://"
                    )));
                }
            }
        }
    }

    if config.search_locations.radius_km == 0 {
        return Err(ConfigError::Validation(
            "search_locations.radius_km must be greater than 0".to_string(),
        ));
    }

    let mut seen_cities = HashSet::new();
    for city in &config.search_locations.major_cities {
        let normalized = city.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ConfigError::Validation(
                "search_locations.major_cities contains an empty city".to_string(),
            ));
        }
        if !seen_cities.insert(normalized) {
            return Err(ConfigError::Validation(format!(
                "duplicate city in search_locations.major_cities: '{city}'"
            )));
        }
    }

    let scraping = &config.scraping;
    if scraping.retry_attempts == 0 {
        return Err(ConfigError::Validation(
            "scraping.retry_attempts must be at least 1".to_string(),
        ));
    }
    if scraping.max_concurrent_sites == 0 {
        return Err(ConfigError::Validation(
            "scraping.max_concurrent_sites must be at least 1".to_string(),
        ));
    }
    if scraping.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "scraping.request_timeout_secs must be at least 1".to_string(),
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging.level '{}' is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    Ok(())
}

fn is_site_slug(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
