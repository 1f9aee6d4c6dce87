//! Site scraping capabilities and the registry that maps configured
//! strategy identifiers to them.
//!
//! A [`ScraperFactory`] is a strategy: it knows how to talk to one kind of
//! store locator. Opening it for a [`SiteJob`] yields a [`SiteScraper`] that
//! owns the job's session resource until [`SiteScraper::close`] is called.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use petlead_core::{ConfigError, ScrapeConfig, SearchQuery, SiteConfig, StoreRecord};

use crate::error::FetchError;

/// A live scraping session for one site job.
#[async_trait]
pub trait SiteScraper: Send + Sync {
    /// `true` when the site lists every store without a location parameter.
    fn location_independent(&self) -> bool {
        false
    }

    /// Run one search.
    ///
    /// Returns [`FetchError::NoResults`] when the location has no stores.
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<StoreRecord>, FetchError>;

    /// Release the session resource. Called exactly once, on every exit path.
    async fn close(&self) {}
}

/// Settings every session is opened with.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub request_timeout: Duration,
    pub user_agent: String,
}

/// A scraping strategy selected by its identifier in configuration.
#[async_trait]
pub trait ScraperFactory: Send + Sync {
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Acquire the session resource for `job`.
    ///
    /// # Errors
    ///
    /// Any error is treated as a session initialisation failure of the job.
    async fn open(
        &self,
        job: &SiteJob,
        settings: &SessionSettings,
    ) -> Result<Box<dyn SiteScraper>, FetchError>;
}

/// One configured unit of scraping work, immutable for the run.
#[derive(Clone)]
pub struct SiteJob {
    pub id: String,
    pub name: String,
    pub url: String,
    pub endpoint: Option<String>,
    pub records_path: Option<String>,
    pub enabled: bool,
    pub strategy: Arc<dyn ScraperFactory>,
}

impl SiteJob {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        strategy: Arc<dyn ScraperFactory>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            endpoint: None,
            records_path: None,
            enabled: true,
            strategy,
        }
    }

    fn from_config(id: &str, site: &SiteConfig, strategy: Arc<dyn ScraperFactory>) -> Self {
        Self {
            id: id.to_string(),
            name: site.name.trim().to_string(),
            url: site.url.clone(),
            endpoint: site.endpoint.clone(),
            records_path: site.records_path.clone(),
            enabled: site.enabled,
            strategy,
        }
    }

    /// The URL data requests go to.
    #[must_use]
    pub fn data_url(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.url)
    }
}

impl std::fmt::Debug for SiteJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteJob")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("endpoint", &self.endpoint)
            .field("records_path", &self.records_path)
            .field("enabled", &self.enabled)
            .field("strategy", &self.strategy.id())
            .finish()
    }
}

/// Known strategies, in registration order.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: IndexMap<&'static str, Arc<dyn ScraperFactory>>,
}

impl StrategyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in HTTP JSON strategies.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::strategies::JsonFeed));
        registry.register(Arc::new(crate::strategies::JsonSearch));
        registry
    }

    /// Add a strategy, replacing any with the same identifier.
    pub fn register(&mut self, factory: Arc<dyn ScraperFactory>) {
        self.factories.insert(factory.id(), factory);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn ScraperFactory>> {
        self.factories.get(id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ScraperFactory>> {
        self.factories.values()
    }
}

/// Build the jobs for a run: every enabled site, or only `only`.
///
/// Strategy identifiers are resolved up front so an unknown one fails the
/// run before any scraping starts.
///
/// # Errors
///
/// [`ConfigError::UnknownSite`] / [`ConfigError::SiteDisabled`] for a bad
/// `only`, [`ConfigError::UnknownStrategy`] for an unregistered strategy.
pub fn build_jobs(
    config: &ScrapeConfig,
    registry: &StrategyRegistry,
    only: Option<&str>,
) -> Result<Vec<SiteJob>, ConfigError> {
    let selected: Vec<(&str, &SiteConfig)> = match only {
        Some(id) => vec![(id, config.enabled_site(id)?)],
        None => config.enabled_sites().collect(),
    };

    selected
        .into_iter()
        .map(|(id, site)| {
            let strategy =
                registry
                    .get(site.strategy.trim())
                    .ok_or_else(|| ConfigError::UnknownStrategy {
                        site: id.to_string(),
                        strategy: site.strategy.clone(),
                    })?;
            Ok(SiteJob::from_config(id, site, strategy))
        })
        .collect()
}
