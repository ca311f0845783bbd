// src/main.rs

//! Command-line entry point.

use std::sync::Arc;

use clap::Parser;
use log::info;

use domain_scraper::error::Result;
use domain_scraper::models::Config;
use domain_scraper::pipeline::run_crawler;
use domain_scraper::storage::JsonlSink;
use domain_scraper::utils::http::HttpTransport;

#[derive(Parser, Debug)]
#[command(name = "domain-scraper")]
#[command(about = "Scrape property listings from domain.com.au search results")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    /// Search URL to start from, overriding the configured seed
    #[arg(long)]
    start_url: Option<String>,

    /// Stop after this many unique records
    #[arg(long)]
    max_results: Option<usize>,

    /// Visit at most this many result pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Skip per-listing detail pages
    #[arg(long)]
    no_details: bool,

    /// JSONL output path, overriding the configured one
    #[arg(short, long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config);

    if let Some(start_url) = cli.start_url {
        config.search.start_url = start_url;
    }
    if let Some(max_results) = cli.max_results {
        config.search.max_results = max_results;
    }
    if let Some(max_pages) = cli.max_pages {
        config.search.max_pages = max_pages;
    }
    if cli.no_details {
        config.search.collect_details = false;
    }
    if let Some(output) = cli.output {
        config.output.path = output;
    }
    config.validate()?;

    let transport = Arc::new(HttpTransport::new(&config.crawler)?);
    let sink = Arc::new(JsonlSink::new(&config.output.path)?);
    let output_path = config.output.path.clone();

    let summary = run_crawler(Arc::new(config), transport, sink).await?;

    info!(
        "Done: {} records ({} pages, {} enriched) written to {output_path}",
        summary.records, summary.pages, summary.details_collected
    );
    Ok(())
}
