//! Store records and the search queries that produce them.
//!
//! A [`StoreRecord`] keeps whatever fields a site exposes, in the order the
//! site exposed them, next to a strongly typed [`Provenance`] block that is
//! identical in shape for every site.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Provenance column names, in output order.
pub const PROVENANCE_COLUMNS: [&str; 5] = [
    "source_website",
    "source_url",
    "search_city",
    "search_radius_km",
    "scraped_at",
];

/// `search_city` value recorded for the single query of a site that does
/// not take a location parameter.
pub const NATIONWIDE_LABEL: &str = "nationwide";

/// One (city, radius) search to run against a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    city: Option<String>,
    radius_km: u32,
}

impl SearchQuery {
    #[must_use]
    pub fn city(city: impl Into<String>, radius_km: u32) -> Self {
        Self {
            city: Some(city.into()),
            radius_km,
        }
    }

    /// The no-op location filter used for nationwide listings.
    #[must_use]
    pub fn nationwide(radius_km: u32) -> Self {
        Self {
            city: None,
            radius_km,
        }
    }

    #[must_use]
    pub fn city_name(&self) -> Option<&str> {
        self.city.as_deref()
    }

    #[must_use]
    pub fn radius_km(&self) -> u32 {
        self.radius_km
    }

    /// Human-readable location, never empty.
    #[must_use]
    pub fn label(&self) -> &str {
        self.city.as_deref().unwrap_or(NATIONWIDE_LABEL)
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} km)", self.label(), self.radius_km)
    }
}

/// Where and when a record was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source_website: String,
    /// The site's public locator page. Empty until set.
    pub source_url: String,
    pub search_city: String,
    pub search_radius_km: u32,
    pub scraped_at: DateTime<Utc>,
}

impl Provenance {
    /// Provenance for a record found by `query` on `source_website` at
    /// `scraped_at`.
    #[must_use]
    pub fn for_query(
        source_website: impl Into<String>,
        query: &SearchQuery,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_website: source_website.into(),
            source_url: String::new(),
            search_city: query.label().to_string(),
            search_radius_km: query.radius_km(),
            scraped_at,
        }
    }

    #[must_use]
    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = source_url.into();
        self
    }

    /// Column values in [`PROVENANCE_COLUMNS`] order.
    #[must_use]
    pub fn values(&self) -> [String; 5] {
        [
            self.source_website.clone(),
            self.source_url.clone(),
            self.search_city.clone(),
            self.search_radius_km.to_string(),
            self.scraped_at.to_rfc3339(),
        ]
    }
}

/// A raw store listing: open, ordered site-defined fields plus provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    pub provenance: Provenance,
    fields: IndexMap<String, String>,
}

impl StoreRecord {
    #[must_use]
    pub fn new(provenance: Provenance) -> Self {
        Self {
            provenance,
            fields: IndexMap::new(),
        }
    }

    /// Builder-style [`StoreRecord::insert`].
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a field, keeping its original position when it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.fields.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value of `key` if present and not blank.
    #[must_use]
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !is_blank(v))
    }

    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, String> {
        &self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Whitespace-only values count as empty.
#[must_use]
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
