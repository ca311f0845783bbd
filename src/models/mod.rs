// src/models/mod.rs

//! Domain models for the scraper.

mod config;
mod listing;

pub use config::{Config, CrawlerConfig, OutputConfig, SearchConfig};
pub use listing::Listing;
