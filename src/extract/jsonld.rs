// src/extract/jsonld.rs

//! JSON-LD structured metadata from listing detail pages.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::extract::state::safe_json_parse;
use crate::extract::value_text;
use crate::models::Listing;
use crate::utils::text::normalize_price;

const LISTING_TYPES: &[&str] = &[
    "RealEstateListing",
    "SingleFamilyResidence",
    "House",
    "Apartment",
    "Product",
];

/// Collect listing fields from every recognized JSON-LD block on a page.
///
/// Blocks are applied in document order and earlier values win, so the most
/// prominent block on the page takes precedence.
pub fn extract_structured_metadata(document: &Html) -> Listing {
    let mut partial = Listing::default();
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return partial;
    };

    for script in document.select(&selector) {
        let text = script.text().collect::<Vec<_>>().join("");
        let Some(parsed) = safe_json_parse(&text) else {
            continue;
        };
        // A block may hold one object or an array of them.
        let blocks: Vec<&Value> = match &parsed {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for block in blocks {
            if matches_listing_type(block) {
                apply_block(&mut partial, block);
            }
        }
    }

    partial
}

fn matches_listing_type(block: &Value) -> bool {
    match block.get("@type") {
        Some(Value::String(t)) => LISTING_TYPES.contains(&t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| LISTING_TYPES.contains(&t)),
        _ => false,
    }
}

fn apply_block(partial: &mut Listing, block: &Value) {
    if let Some(address) = block.get("address") {
        fill(&mut partial.address, text_at(address, "/streetAddress"));
        fill(&mut partial.suburb, text_at(address, "/addressLocality"));
        fill(&mut partial.state, text_at(address, "/addressRegion"));
        fill(&mut partial.postcode, text_at(address, "/postalCode"));
    }

    if let Some(geo) = block.get("geo") {
        if partial.latitude.is_none() {
            partial.latitude = geo.get("latitude").filter(|v| !v.is_null()).cloned();
        }
        if partial.longitude.is_none() {
            partial.longitude = geo.get("longitude").filter(|v| !v.is_null()).cloned();
        }
    }

    if let Some(offers) = block.get("offers") {
        let offer = offers.get(0).unwrap_or(offers);
        let price = text_at(offer, "/price")
            .or_else(|| text_at(offer, "/priceSpecification/price"))
            .as_deref()
            .and_then(normalize_price);
        fill(&mut partial.price, price);
    }

    let land = block
        .get("lotSize")
        .or_else(|| block.get("landSize"))
        .or_else(|| block.get("area"))
        .and_then(|v| v.get("value").filter(|v| !v.is_null()).or(Some(v)))
        .and_then(value_text)
        .map(|v| format!("{v}m2"));
    fill(&mut partial.land_size, land);

    let agency = text_at(block, "/seller/name")
        .or_else(|| text_at(block, "/provider/name"))
        .or_else(|| text_at(block, "/brand/name"));
    fill(&mut partial.agency, agency);

    let agent = text_at(block, "/seller/employee/name")
        .or_else(|| text_at(block, "/seller/contactPoint/name"))
        .or_else(|| text_at(block, "/contactPoint/name"));
    fill(&mut partial.agent, agent);

    fill(&mut partial.description, text_at(block, "/description"));

    // Only dwelling types double as a property type; wrapper types like
    // RealEstateListing or Product say nothing about the dwelling.
    let dwelling = text_at(block, "/@type")
        .filter(|t| matches!(t.as_str(), "House" | "Apartment" | "SingleFamilyResidence"));
    fill(&mut partial.property_type, dwelling);

    if partial.beds.is_none() {
        partial.beds = block.get("numberOfBedrooms").and_then(Value::as_i64);
    }
    if partial.baths.is_none() {
        partial.baths = block.get("numberOfBathroomsTotal").and_then(Value::as_i64);
    }

    if partial.images.is_empty() {
        if let Some(image) = block.get("image") {
            partial.images = match image {
                Value::Array(items) => items.iter().filter_map(value_text).collect(),
                other => value_text(other).into_iter().collect(),
            };
        }
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

fn text_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(value_text)
}
