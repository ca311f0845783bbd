// src/services/detail.rs

//! Per-listing detail enrichment.
//!
//! A detail page is mined in three passes: JSON-LD blocks, embedded client
//! state, then a battery of CSS selectors for whatever is still missing.
//! Enrichment only ever fills gaps; search-result values are authoritative.

use std::sync::Arc;

use log::warn;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::extract::json::normalize_listing_from_json;
use crate::extract::jsonld::extract_structured_metadata;
use crate::extract::state::{extract_embedded_state, find_first_listing_object};
use crate::models::{Config, Listing};
use crate::utils::http::{RetryPolicy, Transport};
use crate::utils::text::{clean_text, extract_land_size, normalize_price};
use crate::utils::url::is_likely_listing_url;

pub struct DetailEnricher {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
}

impl DetailEnricher {
    pub fn new(config: Arc<Config>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Fetch the record's detail page and fill in missing fields.
    ///
    /// Failures are soft: the record always comes back, enriched or not.
    pub async fn enrich(&self, mut record: Listing) -> Listing {
        let base = self.config.crawler.base_url.clone();
        let Some(url) = record.url.clone() else {
            return record;
        };
        if !is_likely_listing_url(&base, &url) {
            return record;
        }

        let policy = RetryPolicy::detail_page(&self.config.crawler);
        let body = match self.transport.fetch(&url, &policy).await {
            Ok(body) => body,
            Err(error) => {
                warn!("Detail fetch failed for {url}: {error}");
                return record;
            }
        };

        let details = extract_details(&body, &url, &base);
        record.merge_missing(details);
        record.ensure_metadata(&base);
        record
    }
}

/// Mine a detail-page body for listing fields.
pub fn extract_details(body: &str, url: &str, base: &str) -> Listing {
    let document = Html::parse_document(body);

    let mut details = extract_structured_metadata(&document);

    if let Some(state) = extract_embedded_state(body) {
        if let Some(embedded) = state
            .payload()
            .and_then(find_first_listing_object)
            .and_then(|raw| normalize_listing_from_json(raw, base))
        {
            details.merge_missing(embedded);
        }
    }

    apply_selectors(&mut details, &document);

    if details.url.is_none() {
        details.url = Some(url.to_string());
    }
    details.ensure_metadata(base);
    details
}

fn apply_selectors(details: &mut Listing, document: &Html) {
    // Comma lists match in document order, so the dedicated summary title
    // gets its own pass before the bare h1 fallback.
    fill_text(
        &mut details.address,
        document,
        r#"[data-testid="listing-details__summary-title"]"#,
    );
    fill_text(&mut details.address, document, "h1");
    fill_text(
        &mut details.description,
        document,
        r#"[data-testid="listing-details__description"] p, [class*="description"] p"#,
    );
    fill_text(
        &mut details.agent,
        document,
        r#"[data-testid="listing-details__agent-details-name"], a[href*="/real-estate-agencies/"] ~ [class*="name"], [class*="agent-name"]"#,
    );
    fill_text(
        &mut details.agency,
        document,
        r#"[data-testid="listing-details__agent-details-agency-name"], [class*="agency-name"]"#,
    );
    fill_text(
        &mut details.property_type,
        document,
        r#"[data-testid="listing-summary-property-type"] div, [data-testid="listing-summary-property-type"]"#,
    );

    if details.price.is_none() {
        details.price = select_first_text(
            document,
            r#"[data-testid="listing-details__summary-title"], [class*="price"]"#,
        )
        .as_deref()
        .and_then(normalize_price);
    }

    apply_feature_containers(details, document);
    apply_inspections(details, document);
    apply_images(details, document);
    apply_feature_list(details, document);
    apply_land_size(details, document);
    apply_geo(details, document);
}

/// The summary strip renders one container per feature, labelled by a unit
/// word; the label decides which slot the number lands in.
fn apply_feature_containers(details: &mut Listing, document: &Html) {
    let Ok(selector) = Selector::parse(r#"[data-testid="property-features-text-container"]"#)
    else {
        return;
    };
    for container in document.select(&selector) {
        let text = container.text().collect::<Vec<_>>().join(" ");
        if text.contains("Bed") {
            if details.beds.is_none() {
                details.beds = first_int(&text);
            }
        } else if text.contains("Bath") {
            if details.baths.is_none() {
                details.baths = first_int(&text);
            }
        } else if text.contains("Parking") || text.contains("Car") {
            if details.parking.is_none() {
                details.parking = first_int(&text);
            }
        } else if details.land_size.is_none() {
            details.land_size = extract_land_size(&text);
        }
    }
}

fn apply_inspections(details: &mut Listing, document: &Html) {
    if !details.inspection_times.is_empty() {
        return;
    }
    let Ok(selector) = Selector::parse(
        r#"[data-testid="listing-details__inspections"] li, [class*="inspection"] time, button[class*="inspection"]"#,
    ) else {
        return;
    };
    details.inspection_times = document
        .select(&selector)
        .filter_map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
        .collect();
}

fn apply_images(details: &mut Listing, document: &Html) {
    if !details.images.is_empty() {
        return;
    }
    let Ok(selector) = Selector::parse(r#"img[src*="domainstatic"], img[src*="rimh"]"#) else {
        return;
    };
    let mut images: Vec<String> = Vec::new();
    for img in document.select(&selector) {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        if src.contains("logo") {
            continue;
        }
        if !images.iter().any(|seen| seen.as_str() == src) {
            images.push(src.to_string());
        }
    }
    details.images = images;
}

fn apply_feature_list(details: &mut Listing, document: &Html) {
    if !details.features.is_empty() {
        return;
    }
    let Ok(selector) = Selector::parse(
        r#"[data-testid="listing-details__additional-features"] li, ul[class*="features"] li"#,
    ) else {
        return;
    };
    details.features = document
        .select(&selector)
        .filter_map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
        .collect();
}

fn apply_land_size(details: &mut Listing, document: &Html) {
    if details.land_size.is_none() {
        details.land_size =
            select_first_text(document, r#"[data-testid="listing-summary-land-size"]"#)
                .as_deref()
                .and_then(extract_land_size);
    }
    if details.land_size.is_none() {
        details.land_size = details
            .features
            .iter()
            .find_map(|feature| extract_land_size(feature));
    }
}

fn apply_geo(details: &mut Listing, document: &Html) {
    if details.latitude.is_some() && details.longitude.is_some() {
        return;
    }

    if let Some(lat) = meta_content(document, r#"meta[property="place:location:latitude"]"#) {
        if let Some(lon) = meta_content(document, r#"meta[property="place:location:longitude"]"#) {
            details.latitude = Some(Value::String(lat));
            details.longitude = Some(Value::String(lon));
            return;
        }
    }

    // "geo.position" packs both coordinates as "lat;lon".
    if let Some(position) = meta_content(document, r#"meta[name="geo.position"]"#) {
        if let Some((lat, lon)) = position.split_once(';') {
            details.latitude = Some(Value::String(lat.trim().to_string()));
            details.longitude = Some(Value::String(lon.trim().to_string()));
            return;
        }
    }

    // Map widgets name the coordinate attributes inconsistently.
    const LAT_ATTRS: &[&str] = &["data-lat", "data-latitude", "data-latitude-deg"];
    const LON_ATTRS: &[&str] = &["data-lng", "data-lon", "data-longitude", "data-longitude-deg"];
    if let Ok(selector) =
        Selector::parse("[data-lat], [data-latitude], [data-latitude-deg]")
    {
        for el in document.select(&selector) {
            let lat = LAT_ATTRS.iter().find_map(|attr| el.value().attr(attr));
            let lon = LON_ATTRS.iter().find_map(|attr| el.value().attr(attr));
            if let (Some(lat), Some(lon)) = (lat, lon) {
                details.latitude = Some(Value::String(lat.to_string()));
                details.longitude = Some(Value::String(lon.to_string()));
                return;
            }
        }
    }

    // Map widgets sometimes pack coordinates as a JSON blob in an attribute.
    if let Ok(selector) = Selector::parse("[data-location]") {
        if let Some(blob) = document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("data-location"))
        {
            if let Ok(parsed) = serde_json::from_str::<Value>(blob) {
                let lat = parsed.get("latitude").or_else(|| parsed.get("lat"));
                let lon = parsed
                    .get("longitude")
                    .or_else(|| parsed.get("lng"))
                    .or_else(|| parsed.get("lon"));
                if let (Some(lat), Some(lon)) = (lat, lon) {
                    details.latitude = Some(lat.clone());
                    details.longitude = Some(lon.clone());
                }
            }
        }
    }
}

fn fill_text(slot: &mut Option<String>, document: &Html, raw_selector: &str) {
    if slot.is_none() {
        *slot = select_first_text(document, raw_selector);
    }
}

fn select_first_text(document: &Html, raw_selector: &str) -> Option<String> {
    let selector = Selector::parse(raw_selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .and_then(|t| clean_text(&t))
}

fn meta_content(document: &Html, raw_selector: &str) -> Option<String> {
    let selector = Selector::parse(raw_selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .and_then(clean_text)
}

fn first_int(text: &str) -> Option<i64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
