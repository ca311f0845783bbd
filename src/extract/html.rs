// src/extract/html.rs

//! HTML card parsing, the last-resort extraction strategy.
//!
//! Three card-selector strategies run in order from most to least specific;
//! the first one that yields any records wins. Class names on the site churn,
//! so the inner selectors lean on substring matches rather than exact classes.

use chrono::Utc;
use log::warn;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::Listing;
use crate::utils::text::{clean_text, normalize_price, parse_feature_counts};
use crate::utils::url::{ensure_absolute_url, is_likely_listing_url, pick_listing_href};

/// Card container selectors, most specific first.
const CARD_STRATEGIES: &[&str] = &[
    r#"[data-testid="listing-card-wrapper"], [data-testid*="listing-card"]"#,
    r#"li[data-testid*="listing"], div[class*="listing-result"], div[class*="property-card"], div[class*="search-result"]"#,
    r#"article, li"#,
];

struct CardSelectors {
    anchors: Selector,
    heading: Selector,
    address: Selector,
    suburb: Selector,
    price: Selector,
    property_type: Selector,
    agency_logo: Selector,
    agent: Selector,
    image: Selector,
    badge: Selector,
    first_div: Selector,
    price_scan: Regex,
}

impl CardSelectors {
    fn new() -> Option<Self> {
        Some(Self {
            anchors: Selector::parse("a[href]").ok()?,
            heading: Selector::parse("h2").ok()?,
            address: Selector::parse(r#"[class*="address"]"#).ok()?,
            suburb: Selector::parse(r#"[class*="suburb"], [class*="location"]"#).ok()?,
            price: Selector::parse(r#"[class*="price"]"#).ok()?,
            property_type: Selector::parse(r#"[class*="property-type"], [class*="type"]"#).ok()?,
            agency_logo: Selector::parse(r#"img[alt*="Logo"], img[class*="logo"]"#).ok()?,
            agent: Selector::parse(r#"[class*="agent"], [class*="name"]"#).ok()?,
            image: Selector::parse(r#"img[src*="domain"], img[src*="realestate"]"#).ok()?,
            badge: Selector::parse(r#"[class*="new"], [class*="badge"]"#).ok()?,
            first_div: Selector::parse("div").ok()?,
            price_scan: Regex::new(r"\$[\d,]+(?:\s*-\s*\$[\d,]+)?").ok()?,
        })
    }
}

/// Parse listing cards out of an already built document.
pub fn parse_listing_cards_in(document: &Html, base: &str, max_cards: usize) -> Vec<Listing> {
    let Some(selectors) = CardSelectors::new() else {
        return Vec::new();
    };

    for strategy in CARD_STRATEGIES {
        let Ok(card_selector) = Selector::parse(strategy) else {
            continue;
        };
        let mut listings: Vec<Listing> = document
            .select(&card_selector)
            .take(max_cards)
            .filter_map(|card| parse_card(card, base, &selectors))
            .collect();
        if !listings.is_empty() {
            listings.truncate(max_cards);
            return listings;
        }
    }

    warn!("no card strategy matched this page");
    Vec::new()
}

/// Parse listing cards out of raw HTML.
pub fn parse_listing_cards(body: &str, base: &str, max_cards: usize) -> Vec<Listing> {
    let document = Html::parse_document(body);
    parse_listing_cards_in(&document, base, max_cards)
}

fn parse_card(card: ElementRef, base: &str, selectors: &CardSelectors) -> Option<Listing> {
    let hrefs: Vec<String> = card
        .select(&selectors.anchors)
        .filter_map(|a| a.value().attr("href").map(str::to_string))
        .collect();
    let href = pick_listing_href(&hrefs)?;
    let url = ensure_absolute_url(base, &href)?;
    if !is_likely_listing_url(base, &url) {
        return None;
    }

    let card_text = card.text().collect::<Vec<_>>().join(" ");
    let counts = parse_feature_counts(&card_text);

    let address = select_text(card, &selectors.address)
        .or_else(|| select_text(card, &selectors.heading))
        .or_else(|| select_text(card, &selectors.first_div));
    let price = select_text(card, &selectors.price)
        .or_else(|| {
            selectors
                .price_scan
                .find(&card_text)
                .and_then(|m| clean_text(m.as_str()))
        })
        .as_deref()
        .and_then(normalize_price);

    let agency = card
        .select(&selectors.agency_logo)
        .next()
        .and_then(|img| img.value().attr("alt"))
        .and_then(clean_text)
        .map(|alt| strip_logo_prefix(&alt));

    let image_url = card.select(&selectors.image).next().and_then(|img| {
        img.value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .and_then(clean_text)
    });

    let has_badge = card.select(&selectors.badge).next().is_some();
    let is_new = card_text.contains("New") || has_badge;

    Some(Listing {
        url: Some(url),
        address,
        price,
        property_type: select_text(card, &selectors.property_type),
        beds: counts.beds,
        baths: counts.baths,
        parking: counts.parking,
        land_size: counts.land_size,
        image_url,
        agent: select_text(card, &selectors.agent),
        agency,
        is_new,
        source: base.trim_end_matches('/').to_string(),
        scraped_at: Utc::now().to_rfc3339(),
        ..Listing::default()
    })
}

/// Follow the next-page link a results page renders.
pub fn extract_next_page_link(document: &Html, base: &str) -> Option<String> {
    const NEXT_SELECTORS: &[&str] = &[r#"a[aria-label="Go to next page"]"#, r#"a[rel="next"]"#];
    for raw in NEXT_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(href) = document
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .next()
        {
            return ensure_absolute_url(base, href);
        }
    }
    None
}

/// Total-results count from the summary header, when present.
pub fn extract_total_results_text(document: &Html) -> Option<u64> {
    let selector = Selector::parse(r#"[data-testid="summary-header-total-results"]"#).ok()?;
    let text = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))?;
    let re = Regex::new(r"([\d,]+)").ok()?;
    let digits = re.captures(&text)?.get(1)?.as_str().replace(',', "");
    digits.parse().ok()
}

fn select_text(card: ElementRef, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .and_then(|t| clean_text(&t))
}

fn strip_logo_prefix(alt: &str) -> String {
    alt.trim_start_matches("Logo for").trim().to_string()
}
