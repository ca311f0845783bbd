// src/pipeline/mod.rs

pub mod crawl;

pub use crawl::{run_crawler, CrawlSummary};
