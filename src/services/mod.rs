// src/services/mod.rs

mod detail;
mod page;

pub use detail::{extract_details, DetailEnricher};
pub use page::PageScraper;
