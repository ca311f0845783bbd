// src/lib.rs

//! Listing scraper for domain.com.au search results.
//!
//! The library is organized as a pipeline: `extract` turns page bodies into
//! normalized records via a strategy cascade, `services` wrap fetching and
//! enrichment, `pipeline` drives pagination and dedup, and `storage` batches
//! records into a sink.

pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
