// src/pipeline/crawl.rs

//! Crawl orchestration: pagination, dedup, detail fan-out, batched output.
//!
//! Result pages are walked sequentially with randomized delays. Accepted
//! records either go straight to the sink or are handed to detail tasks that
//! run behind a fixed-width concurrency gate; the tasks are jointly awaited
//! at the end of the run so output keeps first-seen order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{info, warn};
use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{Config, Listing};
use crate::services::{DetailEnricher, PageScraper};
use crate::storage::{BatchWriter, RecordSink};
use crate::utils::http::Transport;
use crate::utils::url::get_domain;

/// What a finished run accomplished.
#[derive(Debug, Default, Clone)]
pub struct CrawlSummary {
    /// Unique records accepted
    pub records: usize,
    /// Result pages visited
    pub pages: u32,
    /// Records that went through detail enrichment
    pub details_collected: usize,
    /// Total result count the site reported, when it did
    pub total_available: Option<u64>,
}

/// Run one crawl from the configured search to the sink.
pub async fn run_crawler(
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn RecordSink>,
) -> Result<CrawlSummary> {
    let base = config.crawler.base_url.clone();
    let seed = config.search.build_search_url(&base);
    check_seed_domain(&base, &seed)?;

    let max_results = config.search.validated_max_results();
    let page_limit = config.search.page_limit(config.crawler.page_size);
    info!("Starting crawl at {seed} (target {max_results} records, up to {page_limit} pages)");

    let scraper = PageScraper::new(config.clone(), transport.clone());
    let enricher = Arc::new(DetailEnricher::new(config.clone(), transport.clone()));
    let gate = Arc::new(Semaphore::new(config.crawler.max_detail_concurrency));
    let mut writer = BatchWriter::new(sink, config.output.batch_size);

    let mut seen: HashSet<String> = HashSet::new();
    let mut detail_tasks: Vec<JoinHandle<Listing>> = Vec::new();
    let mut summary = CrawlSummary::default();

    let mut next_url = Some(seed);
    let mut current_page: u32 = 0;

    while let Some(url) = next_url.take() {
        if current_page >= page_limit || summary.records >= max_results {
            break;
        }
        current_page += 1;
        summary.pages = current_page;

        let mut extract = scraper.scrape(&url, current_page).await;

        if extract.listings.is_empty() && config.crawler.enable_browser_fallback {
            match transport.render(&url).await {
                Ok(body) => extract = scraper.extract(&body, &url, current_page).await,
                Err(error) => warn!("Browser fallback unavailable for {url}: {error}"),
            }
        }

        if extract.listings.is_empty() {
            warn!("Page {current_page} yielded no listings, stopping pagination");
            break;
        }

        if summary.total_available.is_none() {
            summary.total_available = extract.total_results;
            if let Some(total) = extract.total_results {
                info!("Search reports {total} total results");
            }
        }

        let extracted = extract.listings.len();
        let mut added = 0usize;
        for mut listing in extract.listings {
            if summary.records >= max_results {
                break;
            }
            let Some(key) = listing.dedup_key() else {
                continue;
            };
            if !seen.insert(key) {
                continue;
            }
            listing.ensure_metadata(&base);
            summary.records += 1;
            added += 1;

            if config.search.collect_details {
                detail_tasks.push(spawn_detail_task(
                    enricher.clone(),
                    gate.clone(),
                    config.crawler.detail_delay_min_ms,
                    config.crawler.detail_delay_max_ms,
                    listing,
                ));
            } else {
                writer.push(listing).await?;
            }
        }

        info!(
            "Page {current_page}: {extracted} extracted, {added} new ({}/{max_results})",
            summary.records
        );

        if summary.records >= max_results {
            break;
        }

        next_url = extract.next_page;
        if next_url.is_some() {
            let delay = page_delay(&config);
            tokio::time::sleep(delay).await;
        }
    }

    if !detail_tasks.is_empty() {
        info!("Waiting for {} detail fetches", detail_tasks.len());
        for joined in join_all(detail_tasks).await {
            match joined {
                Ok(listing) => {
                    summary.details_collected += 1;
                    writer.push(listing).await?;
                }
                Err(error) => warn!("Detail task failed: {error}"),
            }
        }
    }
    writer.flush().await?;

    info!(
        "Crawl finished: {} records over {} pages ({} enriched)",
        summary.records, summary.pages, summary.details_collected
    );
    Ok(summary)
}

/// Refuse to crawl a seed pointing somewhere other than the configured site.
fn check_seed_domain(base: &str, seed: &str) -> Result<()> {
    let base_host = get_domain(base)
        .ok_or_else(|| AppError::validation(format!("crawler.base_url is not a URL: {base}")))?;
    let seed_host = get_domain(seed)
        .ok_or_else(|| AppError::validation(format!("search seed is not a URL: {seed}")))?;

    let base_host = base_host.trim_start_matches("www.");
    let seed_host = seed_host.trim_start_matches("www.");
    if seed_host == base_host || seed_host.ends_with(&format!(".{base_host}")) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "search seed host {seed_host} does not belong to {base_host}"
        )))
    }
}

fn page_delay(config: &Config) -> Duration {
    let min = config.crawler.page_delay_min_ms;
    let max = config.crawler.page_delay_max_ms.max(min);
    let millis = rand::thread_rng().gen_range(min..=max);
    Duration::from_millis(millis)
}

fn spawn_detail_task(
    enricher: Arc<DetailEnricher>,
    gate: Arc<Semaphore>,
    delay_min_ms: u64,
    delay_max_ms: u64,
    listing: Listing,
) -> JoinHandle<Listing> {
    tokio::spawn(async move {
        let _permit = match gate.clone().acquire_owned().await {
            Ok(permit) => permit,
            // A closed gate means the run is shutting down.
            Err(_) => return listing,
        };
        let enriched = enricher.enrich(listing).await;
        let millis = rand::thread_rng().gen_range(delay_min_ms..=delay_max_ms.max(delay_min_ms));
        tokio::time::sleep(Duration::from_millis(millis)).await;
        enriched
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::storage::MemorySink;
    use crate::utils::http::RetryPolicy;

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

    fn card(id: u64) -> String {
        let token = 1_000_000 + id;
        format!(r#"<article><a href="/property/{id}-test-st-{token}">Card {id}</a></article>"#)
    }

    fn results_page(ids: std::ops::Range<u64>, next_href: Option<&str>) -> String {
        let mut body = String::from("<html><body>");
        for id in ids {
            body.push_str(&card(id));
        }
        if let Some(href) = next_href {
            body.push_str(&format!(r#"<a rel="next" href="{href}">Next</a>"#));
        }
        body.push_str("</body></html>");
        body
    }

    fn test_config(max_results: usize) -> Arc<Config> {
        let mut config = Config::default();
        config.search.start_url = "https://www.domain.com.au/sale/test/".to_string();
        config.search.max_results = max_results;
        config.search.max_pages = 5;
        config.search.collect_details = false;
        config.crawler.page_delay_min_ms = 0;
        config.crawler.page_delay_max_ms = 0;
        config.crawler.detail_delay_min_ms = 0;
        config.crawler.detail_delay_max_ms = 0;
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_two_page_crawl_respects_max_results() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "https://www.domain.com.au/sale/test/".to_string(),
            results_page(0..20, Some("/sale/test/?page=2")),
        );
        bodies.insert(
            "https://www.domain.com.au/sale/test/?page=2".to_string(),
            results_page(20..25, None),
        );

        let sink = Arc::new(MemorySink::new());
        let summary = run_crawler(
            test_config(23),
            Arc::new(FakeTransport { bodies }),
            sink.clone(),
        )
        .await
        .unwrap();

        assert_eq!(summary.records, 23);
        assert_eq!(summary.pages, 2);

        let records = sink.records();
        assert_eq!(records.len(), 23);
        // First-seen order is preserved across pages.
        assert_eq!(records[0].id, Some("1000000".to_string()));
        assert_eq!(records[20].id, Some("1000020".to_string()));
        // Full batches of 10 plus a short final batch.
        assert_eq!(sink.batch_sizes(), vec![10, 10, 3]);
    }

    #[tokio::test]
    async fn test_duplicates_across_pages_are_dropped() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "https://www.domain.com.au/sale/test/".to_string(),
            results_page(0..5, Some("/sale/test/?page=2")),
        );
        // Page 2 repeats page 1's listings plus one new one.
        bodies.insert(
            "https://www.domain.com.au/sale/test/?page=2".to_string(),
            results_page(0..6, None),
        );

        let sink = Arc::new(MemorySink::new());
        let summary = run_crawler(
            test_config(100),
            Arc::new(FakeTransport { bodies }),
            sink.clone(),
        )
        .await
        .unwrap();

        assert_eq!(summary.records, 6);
        assert_eq!(sink.records().len(), 6);
    }

    #[tokio::test]
    async fn test_empty_page_ends_pagination() {
        let mut bodies = HashMap::new();
        bodies.insert(
            "https://www.domain.com.au/sale/test/".to_string(),
            results_page(0..5, Some("/sale/test/?page=2")),
        );
        bodies.insert(
            "https://www.domain.com.au/sale/test/?page=2".to_string(),
            "<html><body>nothing here</body></html>".to_string(),
        );

        let sink = Arc::new(MemorySink::new());
        let summary = run_crawler(
            test_config(100),
            Arc::new(FakeTransport { bodies }),
            sink.clone(),
        )
        .await
        .unwrap();

        assert_eq!(summary.records, 5);
        assert_eq!(summary.pages, 2);
    }

    #[tokio::test]
    async fn test_foreign_seed_is_rejected() {
        let mut config = Config::default();
        config.search.start_url = "https://evil.example.com/sale/".to_string();

        let result = run_crawler(
            Arc::new(config),
            Arc::new(FakeTransport {
                bodies: HashMap::new(),
            }),
            Arc::new(MemorySink::new()),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    /// Transport that gauges how many detail fetches run at once.
    struct GaugedTransport {
        bodies: HashMap<String, String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Transport for GaugedTransport {
        async fn fetch(&self, url: &str, _policy: &RetryPolicy) -> Result<String> {
            let counted = url.contains("/property/");
            if counted {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            let body = self
                .bodies
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::fetch(url, "no stubbed response"));
            if counted {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            body
        }
    }

    #[tokio::test]
    async fn test_detail_fetches_stay_within_concurrency_gate() {
        let detail_body = r#"<html><body><h1>1 Test St</h1></body></html>"#;

        let mut bodies = HashMap::new();
        bodies.insert(
            "https://www.domain.com.au/sale/test/".to_string(),
            results_page(0..10, None),
        );
        for id in 0..10u64 {
            bodies.insert(
                format!(
                    "https://www.domain.com.au/property/{id}-test-st-{}",
                    1_000_000 + id
                ),
                detail_body.to_string(),
            );
        }

        let mut config = Config::default();
        config.search.start_url = "https://www.domain.com.au/sale/test/".to_string();
        config.search.max_results = 10;
        config.search.collect_details = true;
        config.crawler.page_delay_min_ms = 0;
        config.crawler.page_delay_max_ms = 0;
        config.crawler.detail_delay_min_ms = 0;
        config.crawler.detail_delay_max_ms = 0;
        let width = config.crawler.max_detail_concurrency;

        let transport = Arc::new(GaugedTransport {
            bodies,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let sink = Arc::new(MemorySink::new());
        let summary = run_crawler(Arc::new(config), transport.clone(), sink.clone())
            .await
            .unwrap();

        assert_eq!(summary.records, 10);
        assert_eq!(summary.details_collected, 10);
        assert_eq!(sink.records().len(), 10);

        let max_seen = transport.max_in_flight.load(Ordering::SeqCst);
        assert!(max_seen <= width, "saw {max_seen} concurrent detail fetches");
        // The fetches actually overlapped, so the gate was exercised.
        assert!(max_seen >= 2, "detail fetches never overlapped");
    }

    #[tokio::test]
    async fn test_details_are_merged_into_output() {
        let detail_body = r#"
            <html><head>
              <script type="application/ld+json">
                {"@type":"RealEstateListing","description":"Enriched."}
              </script>
            </head><body><h1>1 Test St</h1></body></html>
        "#;

        let mut bodies = HashMap::new();
        bodies.insert(
            "https://www.domain.com.au/sale/test/".to_string(),
            results_page(0..2, None),
        );
        for id in 0..2u64 {
            bodies.insert(
                format!(
                    "https://www.domain.com.au/property/{id}-test-st-{}",
                    1_000_000 + id
                ),
                detail_body.to_string(),
            );
        }

        let mut config = Config::default();
        config.search.start_url = "https://www.domain.com.au/sale/test/".to_string();
        config.search.max_results = 10;
        config.search.collect_details = true;
        config.crawler.page_delay_min_ms = 0;
        config.crawler.page_delay_max_ms = 0;
        config.crawler.detail_delay_min_ms = 0;
        config.crawler.detail_delay_max_ms = 0;

        let sink = Arc::new(MemorySink::new());
        let summary = run_crawler(
            Arc::new(config),
            Arc::new(FakeTransport { bodies }),
            sink.clone(),
        )
        .await
        .unwrap();

        assert_eq!(summary.records, 2);
        assert_eq!(summary.details_collected, 2);
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.description.as_deref() == Some("Enriched.")));
    }
}
