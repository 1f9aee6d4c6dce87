//! Built-in strategies for locators that answer with JSON over plain HTTP.
//!
//! - `json_feed`: one request returns every store; location-independent.
//! - `json_search`: one request per city, passing `city` and `radius` as
//!   query parameters.

mod extract;
mod http;

use async_trait::async_trait;
use chrono::Utc;
use petlead_core::{Provenance, SearchQuery, StoreRecord};

use crate::error::FetchError;
use crate::site::{ScraperFactory, SessionSettings, SiteJob, SiteScraper};

/// Strategy for a site exposing its whole store list at one URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFeed;

/// Strategy for a site answering location searches.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSearch;

#[async_trait]
impl ScraperFactory for JsonFeed {
    fn id(&self) -> &'static str {
        "json_feed"
    }

    fn description(&self) -> &'static str {
        "single JSON document listing every store"
    }

    async fn open(
        &self,
        job: &SiteJob,
        settings: &SessionSettings,
    ) -> Result<Box<dyn SiteScraper>, FetchError> {
        Ok(Box::new(JsonSession::open(job, settings, Mode::Feed)?))
    }
}

#[async_trait]
impl ScraperFactory for JsonSearch {
    fn id(&self) -> &'static str {
        "json_search"
    }

    fn description(&self) -> &'static str {
        "JSON search endpoint queried per city and radius"
    }

    async fn open(
        &self,
        job: &SiteJob,
        settings: &SessionSettings,
    ) -> Result<Box<dyn SiteScraper>, FetchError> {
        Ok(Box::new(JsonSession::open(job, settings, Mode::Search)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Feed,
    Search,
}

/// HTTP session shared by both JSON strategies.
struct JsonSession {
    client: reqwest::Client,
    site_name: String,
    site_url: String,
    data_url: String,
    records_path: Option<String>,
    mode: Mode,
}

impl JsonSession {
    fn open(job: &SiteJob, settings: &SessionSettings, mode: Mode) -> Result<Self, FetchError> {
        let data_url = job.data_url().trim().to_string();
        reqwest::Url::parse(&data_url)
            .map_err(|e| FetchError::SessionInit(format!("invalid URL '{data_url}': {e}")))?;
        let client = http::build_client(settings.request_timeout, &settings.user_agent)?;
        tracing::debug!(site = %job.id, url = %data_url, ?mode, "opened HTTP session");
        Ok(Self {
            client,
            site_name: job.name.clone(),
            site_url: job.url.clone(),
            data_url,
            records_path: job.records_path.clone(),
            mode,
        })
    }

    fn request(&self, query: &SearchQuery) -> reqwest::RequestBuilder {
        let request = self.client.get(&self.data_url);
        match (self.mode, query.city_name()) {
            (Mode::Search, Some(city)) => request.query(&[
                ("city", city.to_string()),
                ("radius", query.radius_km().to_string()),
            ]),
            _ => request,
        }
    }
}

#[async_trait]
impl SiteScraper for JsonSession {
    fn location_independent(&self) -> bool {
        self.mode == Mode::Feed
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<StoreRecord>, FetchError> {
        let body = http::fetch_json(self.request(query)).await?;
        let items = extract::locate_records(&body, self.records_path.as_deref())?;
        if items.is_empty() {
            return Err(FetchError::NoResults);
        }
        let provenance = Provenance::for_query(&self.site_name, query, Utc::now())
            .with_source_url(&self.site_url);
        let records = extract::to_records(items, &provenance);
        if records.is_empty() {
            return Err(FetchError::Incompatible(format!(
                "{} entries at {} but none is an object",
                items.len(),
                self.data_url
            )));
        }
        Ok(records)
    }
}
