// src/services/page.rs

//! Results-page scraping: one fetch plus the strategy cascade.
//!
//! Strategies run from cheapest-structured to last-resort: embedded client
//! state, then the site's JSON search endpoints, then HTML card parsing. A
//! page that fails every strategy produces an empty extract, never an error,
//! so one bad page cannot end a crawl.

use std::sync::Arc;

use log::{debug, info, warn};
use scraper::Html;
use serde_json::Value;

use crate::extract::html::{
    extract_next_page_link, extract_total_results_text, parse_listing_cards_in,
};
use crate::extract::json::{
    extract_listings_from_payload, extract_total_results, normalize_listing_from_json,
};
use crate::extract::state::{extract_embedded_state, listings_from_apollo_state};
use crate::extract::PageExtract;
use crate::models::{Config, Listing};
use crate::utils::http::{RetryPolicy, Transport};
use crate::utils::url::derive_next_page_url;

pub struct PageScraper {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
}

impl PageScraper {
    pub fn new(config: Arc<Config>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Fetch one results page and run the extraction cascade over it.
    pub async fn scrape(&self, url: &str, current_page: u32) -> PageExtract {
        let policy = RetryPolicy::listing_page(&self.config.crawler);
        match self.transport.fetch(url, &policy).await {
            Ok(body) => self.extract(&body, url, current_page).await,
            Err(error) => {
                warn!("Failed to fetch results page {url}: {error}");
                PageExtract::default()
            }
        }
    }

    /// Run the strategy cascade over an already fetched body.
    pub async fn extract(&self, body: &str, url: &str, current_page: u32) -> PageExtract {
        let crawler = &self.config.crawler;
        if body.len() < 1000 || body.contains("403 Forbidden") {
            warn!(
                "Response for {url} looks blocked or truncated ({} bytes)",
                body.len()
            );
        }

        let mut extract = self.extract_embedded(body, url, current_page);

        if extract.listings.is_empty() {
            if let Some(api) = self.probe_json_api(url, current_page).await {
                extract = api;
            }
        }

        if extract.listings.is_empty() {
            let cards = parse_page_cards(body, &crawler.base_url, crawler.max_card_parse as usize);
            if !cards.listings.is_empty() {
                info!(
                    "HTML card parsing recovered {} listings from {url}",
                    cards.listings.len()
                );
            }
            extract = cards;
        }

        if !extract.listings.is_empty() {
            if extract.next_page.is_none() || extract.total_results.is_none() {
                let (next, total) = page_navigation(body, &crawler.base_url);
                if extract.next_page.is_none() {
                    extract.next_page = next;
                }
                if extract.total_results.is_none() {
                    extract.total_results = total;
                }
            }
            if extract.next_page.is_none() {
                extract.next_page = derive_next_page_url(url, current_page, crawler.page_size);
            }
        } else {
            warn!("No listings extracted from {url} by any strategy");
        }

        extract
    }

    fn extract_embedded(&self, body: &str, url: &str, current_page: u32) -> PageExtract {
        let crawler = &self.config.crawler;
        let Some(state) = extract_embedded_state(body) else {
            return PageExtract::default();
        };

        if let Some(apollo) = &state.apollo_state {
            let listings: Vec<Listing> = listings_from_apollo_state(apollo)
                .into_iter()
                .filter_map(|raw| normalize_listing_from_json(raw, &crawler.base_url))
                .collect();
            if !listings.is_empty() {
                info!(
                    "Extracted {} listings from embedded client state",
                    listings.len()
                );
                return PageExtract {
                    total_results: extract_total_results(apollo),
                    listings,
                    next_page: None,
                };
            }
        }

        if let Some(payload) = state.payload() {
            let extract = extract_listings_from_payload(
                payload,
                &crawler.base_url,
                url,
                current_page,
                crawler.page_size,
            );
            if !extract.listings.is_empty() {
                info!(
                    "Extracted {} listings from embedded page data",
                    extract.listings.len()
                );
            }
            return extract;
        }

        PageExtract::default()
    }

    /// Try the site's JSON search endpoints for the same query.
    async fn probe_json_api(&self, url: &str, current_page: u32) -> Option<PageExtract> {
        let crawler = &self.config.crawler;
        let policy = RetryPolicy::api_probe(crawler);
        let candidates = crate::utils::url::build_api_candidates(
            &crawler.base_url,
            url,
            current_page.max(1),
            crawler.page_size,
        );

        for candidate in candidates {
            let body = match self.transport.fetch(&candidate, &policy).await {
                Ok(body) => body,
                Err(error) => {
                    debug!("API candidate {candidate} failed: {error}");
                    continue;
                }
            };
            let Ok(payload) = serde_json::from_str::<Value>(&body) else {
                debug!("API candidate {candidate} returned non-JSON");
                continue;
            };
            let extract = extract_listings_from_payload(
                &payload,
                &crawler.base_url,
                url,
                current_page,
                crawler.page_size,
            );
            if !extract.listings.is_empty() {
                info!(
                    "JSON API candidate {candidate} yielded {} listings",
                    extract.listings.len()
                );
                return Some(extract);
            }
        }
        None
    }
}

fn parse_page_cards(body: &str, base: &str, max_cards: usize) -> PageExtract {
    let document = Html::parse_document(body);
    PageExtract {
        listings: parse_listing_cards_in(&document, base, max_cards),
        next_page: extract_next_page_link(&document, base),
        total_results: extract_total_results_text(&document),
    }
}

fn page_navigation(body: &str, base: &str) -> (Option<String>, Option<u64>) {
    let document = Html::parse_document(body);
    (
        extract_next_page_link(&document, base),
        extract_total_results_text(&document),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    use crate::error::{AppError, Result};

    struct FakeTransport {
        bodies: HashMap<String, String>,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn fetch(&self, url: &str, _policy: &RetryPolicy) -> Result<String> {
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::fetch(url, "no stubbed response"))
        }
    }

    fn config() -> Arc<Config> {
        Arc::new(Config::default())
    }

    fn scraper_with(bodies: HashMap<String, String>) -> PageScraper {
        PageScraper::new(config(), Arc::new(FakeTransport { bodies }))
    }

    fn next_data_page(listings: usize) -> String {
        let items: Vec<_> = (0..listings)
            .map(|i| {
                json!({
                    "listingId": 2000000 + i,
                    "url": format!("/property/{i}-a-st-{}", 2000000 + i)
                })
            })
            .collect();
        let blob = json!({
            "props": {"pageProps": {"listings": items, "totalResults": 77}}
        });
        format!(
            r#"<html><body><script id="__NEXT_DATA__" type="application/json">{blob}</script></body></html>"#
        )
    }

    #[tokio::test]
    async fn test_embedded_state_strategy_wins() {
        let scraper = scraper_with(HashMap::new());
        let extract = scraper
            .extract(
                &next_data_page(3),
                "https://www.domain.com.au/sale/carlton/",
                1,
            )
            .await;

        assert_eq!(extract.listings.len(), 3);
        assert_eq!(extract.total_results, Some(77));
        // Pagination synthesized from the request URL.
        assert_eq!(
            extract.next_page.as_deref(),
            Some("https://www.domain.com.au/sale/carlton/?page=2&pageSize=40")
        );
    }

    #[tokio::test]
    async fn test_json_api_fallback() {
        let api_payload = json!({
            "results": [{"listingId": 1, "url": "/property/x-1111111"}],
            "totalResults": 9
        });
        let mut bodies = HashMap::new();
        let url = "https://www.domain.com.au/sale/carlton/";
        let crawler = Config::default().crawler;
        let candidates =
            crate::utils::url::build_api_candidates(&crawler.base_url, url, 1, crawler.page_size);
        bodies.insert(candidates[0].clone(), api_payload.to_string());

        let scraper = scraper_with(bodies);
        let extract = scraper
            .extract("<html><body>nothing embedded</body></html>", url, 1)
            .await;

        assert_eq!(extract.listings.len(), 1);
        assert_eq!(extract.total_results, Some(9));
    }

    #[tokio::test]
    async fn test_html_card_fallback() {
        let body = r#"
            <html><body>
              <article><a href="/property/9-low-st-1234567">9 Low St</a></article>
              <a rel="next" href="/sale/carlton/?page=2">Next</a>
            </body></html>
        "#;
        let scraper = scraper_with(HashMap::new());
        let extract = scraper
            .extract(body, "https://www.domain.com.au/sale/carlton/", 1)
            .await;

        assert_eq!(extract.listings.len(), 1);
        assert_eq!(
            extract.next_page.as_deref(),
            Some("https://www.domain.com.au/sale/carlton/?page=2")
        );
    }

    #[tokio::test]
    async fn test_everything_fails_yields_empty() {
        let scraper = scraper_with(HashMap::new());
        let extract = scraper
            .extract("<html></html>", "https://www.domain.com.au/sale/", 1)
            .await;
        assert!(extract.listings.is_empty());
        assert!(extract.next_page.is_none());
    }

    #[tokio::test]
    async fn test_scrape_fetch_failure_is_soft() {
        let scraper = scraper_with(HashMap::new());
        let extract = scraper
            .scrape("https://www.domain.com.au/sale/", 1)
            .await;
        assert!(extract.listings.is_empty());
    }
}
