// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Search seed and filter settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Output sink settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agents.is_empty() {
            return Err(AppError::validation("crawler.user_agents is empty"));
        }
        if self.crawler.base_url.trim().is_empty() {
            return Err(AppError::validation("crawler.base_url is empty"));
        }
        if self.crawler.max_detail_concurrency == 0 {
            return Err(AppError::validation(
                "crawler.max_detail_concurrency must be > 0",
            ));
        }
        if self.crawler.page_size == 0 {
            return Err(AppError::validation("crawler.page_size must be > 0"));
        }
        if self.crawler.page_delay_min_ms > self.crawler.page_delay_max_ms {
            return Err(AppError::validation("crawler.page_delay range is inverted"));
        }
        if self.crawler.detail_delay_min_ms > self.crawler.detail_delay_max_ms {
            return Err(AppError::validation(
                "crawler.detail_delay range is inverted",
            ));
        }
        if self.search.max_results == 0 {
            return Err(AppError::validation("search.max_results must be > 0"));
        }
        if self.output.batch_size == 0 {
            return Err(AppError::validation("output.batch_size must be > 0"));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Site root; also the origin recorded on every record
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent pool, rotated per request
    #[serde(default = "defaults::user_agents")]
    pub user_agents: Vec<String>,

    /// Timeout for search-result pages, in seconds
    #[serde(default = "defaults::listing_timeout")]
    pub listing_timeout_secs: u64,

    /// Timeout for detail pages, in seconds (heavier pages)
    #[serde(default = "defaults::detail_timeout")]
    pub detail_timeout_secs: u64,

    /// Timeout for JSON API probes, in seconds
    #[serde(default = "defaults::api_timeout")]
    pub api_timeout_secs: u64,

    /// Randomized delay between listing pages, milliseconds
    #[serde(default = "defaults::page_delay_min")]
    pub page_delay_min_ms: u64,
    #[serde(default = "defaults::page_delay_max")]
    pub page_delay_max_ms: u64,

    /// Randomized delay after each detail merge, milliseconds
    #[serde(default = "defaults::detail_delay_min")]
    pub detail_delay_min_ms: u64,
    #[serde(default = "defaults::detail_delay_max")]
    pub detail_delay_max_ms: u64,

    /// Width of the detail-fetch concurrency gate
    #[serde(default = "defaults::max_detail_concurrency")]
    pub max_detail_concurrency: usize,

    /// Page size requested when synthesizing pagination URLs
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Cap on cards parsed per page, against pathological markup
    #[serde(default = "defaults::max_card_parse")]
    pub max_card_parse: usize,

    /// Render pages through a browser when plain fetching finds nothing
    #[serde(default)]
    pub enable_browser_fallback: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agents: defaults::user_agents(),
            listing_timeout_secs: defaults::listing_timeout(),
            detail_timeout_secs: defaults::detail_timeout(),
            api_timeout_secs: defaults::api_timeout(),
            page_delay_min_ms: defaults::page_delay_min(),
            page_delay_max_ms: defaults::page_delay_max(),
            detail_delay_min_ms: defaults::detail_delay_min(),
            detail_delay_max_ms: defaults::detail_delay_max(),
            max_detail_concurrency: defaults::max_detail_concurrency(),
            page_size: defaults::page_size(),
            max_card_parse: defaults::max_card_parse(),
            enable_browser_fallback: false,
        }
    }
}

/// Search seed and optional filters.
///
/// Filters are only used to construct the initial search URL; the mapping is
/// a fixed lookup table, not crawl logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "defaults::start_url")]
    pub start_url: String,

    /// Target result count
    #[serde(default = "defaults::max_results")]
    pub max_results: usize,

    /// Page ceiling
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    /// Fetch each listing's detail page
    #[serde(default = "defaults::collect_details")]
    pub collect_details: bool,

    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub min_price: Option<u64>,
    #[serde(default)]
    pub max_price: Option<u64>,
    #[serde(default)]
    pub min_beds: Option<u32>,

    #[serde(default = "defaults::sort_by")]
    pub sort_by: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            start_url: defaults::start_url(),
            max_results: defaults::max_results(),
            max_pages: defaults::max_pages(),
            collect_details: defaults::collect_details(),
            location: None,
            state: None,
            property_type: None,
            min_price: None,
            max_price: None,
            min_beds: None,
            sort_by: defaults::sort_by(),
        }
    }
}

impl SearchConfig {
    /// Target result count clamped to sane bounds.
    pub fn validated_max_results(&self) -> usize {
        self.max_results.clamp(1, 1000)
    }

    /// Effective page ceiling: the configured value, raised so enough pages
    /// are visited even when dedup or filters drop items, capped at 50.
    pub fn page_limit(&self, page_size: u32) -> u32 {
        let max_results = self.validated_max_results() as u32;
        let per_page = page_size.max(20);
        let estimate = max_results.div_ceil(per_page);
        let dedup_margin = max_results.div_ceil(15);
        self.max_pages
            .clamp(1, 50)
            .max(estimate)
            .max(dedup_margin)
            .min(50)
    }

    /// Build the initial search URL. Without filters the configured seed URL
    /// is used as-is.
    pub fn build_search_url(&self, base: &str) -> String {
        let has_filters = self.location.is_some()
            || self.state.is_some()
            || self.property_type.is_some()
            || self.min_price.is_some()
            || self.max_price.is_some()
            || self.min_beds.is_some();
        if !has_filters {
            return self.start_url.clone();
        }

        let base = base.trim_end_matches('/');
        let path = if let Some(state) = &self.state {
            format!("{base}/sale/{}/", state.to_lowercase())
        } else if let Some(location) = &self.location {
            let slug = location
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-");
            format!("{base}/sale/{slug}/")
        } else {
            format!("{base}/sale/")
        };

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(property_type) = &self.property_type {
            params.push(("ptype", map_property_type(property_type)));
        }
        match (self.min_price, self.max_price) {
            (Some(min), Some(max)) => params.push(("price", format!("{min}-{max}"))),
            (Some(min), None) => params.push(("price", format!("{min}-any"))),
            (None, Some(max)) => params.push(("price", format!("any-{max}"))),
            (None, None) => {}
        }
        if let Some(beds) = self.min_beds {
            params.push(("bedrooms", beds.to_string()));
        }
        params.push(("excludeunderoffer", "1".to_string()));
        params.push(("sort", self.sort_by.clone()));

        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{path}?{query}")
    }
}

/// Fixed filter-name to site-parameter lookup.
const PROPERTY_TYPE_MAP: &[(&str, &str)] = &[
    ("house", "House"),
    ("apartment", "ApartmentUnitFlat"),
    ("townhouse", "Townhouse"),
    ("villa", "Villa"),
    ("land", "VacantLand"),
];

fn map_property_type(raw: &str) -> String {
    let lower = raw.to_lowercase();
    PROPERTY_TYPE_MAP
        .iter()
        .find(|(key, _)| *key == lower)
        .map(|(_, value)| (*value).to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Output sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSONL output path
    #[serde(default = "defaults::output_path")]
    pub path: String,

    /// Records per sink batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: defaults::output_path(),
            batch_size: defaults::batch_size(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn base_url() -> String {
        "https://www.domain.com.au".into()
    }
    pub fn user_agents() -> Vec<String> {
        vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".into(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".into(),
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".into(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0".into(),
        ]
    }
    pub fn listing_timeout() -> u64 {
        12
    }
    pub fn detail_timeout() -> u64 {
        20
    }
    pub fn api_timeout() -> u64 {
        5
    }
    pub fn page_delay_min() -> u64 {
        500
    }
    pub fn page_delay_max() -> u64 {
        1400
    }
    pub fn detail_delay_min() -> u64 {
        150
    }
    pub fn detail_delay_max() -> u64 {
        500
    }
    pub fn max_detail_concurrency() -> usize {
        3
    }
    pub fn page_size() -> u32 {
        40
    }
    pub fn max_card_parse() -> usize {
        160
    }

    // Search defaults
    pub fn start_url() -> String {
        "https://www.domain.com.au/sale/?excludeunderoffer=1&sort=dateupdated-desc".into()
    }
    pub fn max_results() -> usize {
        50
    }
    pub fn max_pages() -> u32 {
        5
    }
    pub fn collect_details() -> bool {
        true
    }
    pub fn sort_by() -> String {
        "dateupdated-desc".into()
    }

    // Output defaults
    pub fn output_path() -> String {
        "data/listings.jsonl".into()
    }
    pub fn batch_size() -> usize {
        10
    }
}
