// src/extract/json.rs

//! Heterogeneous-schema JSON normalizer.
//!
//! The upstream API has gone through several naming conventions and serves
//! them simultaneously. Every concept is resolved through an ordered list of
//! alternative accessors, first non-null wins. The lists are kept as data so
//! schema drift stays a one-line change.

use chrono::Utc;
use serde_json::Value;

use crate::extract::state::locate_listing_array;
use crate::extract::{value_text, PageExtract};
use crate::models::Listing;
use crate::utils::text::normalize_price;
use crate::utils::url::{
    derive_next_page_url, ensure_absolute_url, extract_listing_id, is_likely_listing_url,
};

// Alternative field names per concept.
const PROPERTY_DETAIL_KEYS: &[&str] = &["propertyDetails", "property", "details"];
const ADDRESS_KEYS: &[&str] = &["address", "addressParts"];
const ADVERTISER_KEYS: &[&str] = &["advertiser", "agency", "agencyDetails"];
const PRICE_KEYS: &[&str] = &["priceDetails", "pricing", "price"];
const GEO_KEYS: &[&str] = &["geoLocation", "geo", "location"];
const MEDIA_KEYS: &[&str] = &["media", "mediaItems", "images"];

/// Map one raw listing-like object into a canonical record.
///
/// Returns `None` unless a URL is present and passes the listing predicate.
pub fn normalize_listing_from_json(raw: &Value, base: &str) -> Option<Listing> {
    let listing = raw
        .get("listing")
        .filter(|v| v.is_object())
        .unwrap_or(raw);
    if !listing.is_object() {
        return None;
    }

    let details = pick(listing, PROPERTY_DETAIL_KEYS);
    let address =
        pick(listing, ADDRESS_KEYS).or_else(|| details.and_then(|d| pick(d, ADDRESS_KEYS)));
    let advertiser = pick(listing, ADVERTISER_KEYS);
    let price_details = pick(listing, PRICE_KEYS);
    let geo = pick(listing, GEO_KEYS);
    let media = pick(listing, MEDIA_KEYS);

    let url_candidate = get_str(Some(listing), "url")
        .or_else(|| get_str(Some(listing), "listingUrl"))
        .or_else(|| get_str(Some(listing), "canonicalUrl"))
        .or_else(|| get_str(Some(listing), "listingSlug"));
    let url = url_candidate
        .and_then(|u| ensure_absolute_url(base, &u))
        .filter(|u| is_likely_listing_url(base, u))?;

    let id = get_str(Some(listing), "id")
        .or_else(|| get_str(Some(listing), "listingId"))
        .or_else(|| get_str(details, "id"))
        .or_else(|| get_str(Some(listing), "listingSlug"))
        .or_else(|| extract_listing_id(&url));

    let price_text = get_str(price_details, "displayPrice")
        .or_else(|| get_str(price_details, "priceText"))
        .or_else(|| get_str(price_details, "price"))
        .or_else(|| get_str(Some(listing), "priceText"));

    let land_size = get_value(details, "landArea")
        .or_else(|| get_value(details, "landSize"))
        .and_then(value_text)
        .map(|v| format!("{v}m2"));

    let image_url =
        get_str(Some(listing), "imageUrl").or_else(|| media.and_then(first_image_url));

    let agent = advertiser
        .and_then(|a| a.pointer("/contacts/0/name"))
        .and_then(value_text)
        .or_else(|| get_str(advertiser, "agent"))
        .or_else(|| get_str(Some(listing), "agent"));
    let agency = advertiser
        .and_then(|a| a.pointer("/primaryAgency/name"))
        .and_then(value_text)
        .or_else(|| get_str(advertiser, "agencyName"))
        .or_else(|| get_str(advertiser, "name"));

    let tags_has_new = listing
        .get("tags")
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some("new")));
    let is_new = bool_field(listing, "isNew") || bool_field(listing, "newListing") || tags_has_new;

    Some(Listing {
        id,
        url: Some(url),
        address: get_str(Some(listing), "displayAddress")
            .or_else(|| get_str(address, "displayAddress"))
            .or_else(|| get_str(address, "street"))
            .or_else(|| get_str(address, "streetAddress")),
        suburb: get_str(address, "suburb")
            .or_else(|| get_str(address, "locality"))
            .or_else(|| get_str(address, "suburbName")),
        state: get_str(address, "state")
            .or_else(|| get_str(address, "stateAbbreviation"))
            .or_else(|| get_str(address, "region")),
        postcode: get_str(address, "postcode").or_else(|| get_str(address, "postalCode")),
        price: price_text.as_deref().and_then(normalize_price),
        property_type: get_str(details, "propertyType")
            .or_else(|| get_str(Some(listing), "propertyType")),
        beds: get_i64(details, "bedrooms")
            .or_else(|| get_i64(details, "beds"))
            .or_else(|| get_i64(Some(listing), "beds")),
        baths: get_i64(details, "bathrooms").or_else(|| get_i64(Some(listing), "bathrooms")),
        parking: get_i64(details, "carspaces")
            .or_else(|| get_i64(details, "parkingSpaces"))
            .or_else(|| get_i64(Some(listing), "carspaces"))
            .or_else(|| get_i64(Some(listing), "parking")),
        land_size,
        image_url,
        agent,
        agency,
        latitude: get_value(geo, "latitude")
            .or_else(|| get_value(geo, "lat"))
            .cloned(),
        longitude: get_value(geo, "longitude")
            .or_else(|| get_value(geo, "lon"))
            .cloned(),
        is_new,
        source: base.trim_end_matches('/').to_string(),
        scraped_at: Utc::now().to_rfc3339(),
        ..Listing::default()
    })
}

/// Extract listings plus pagination metadata from a generic JSON payload.
pub fn extract_listings_from_payload(
    payload: &Value,
    base: &str,
    source_url: &str,
    current_page: u32,
    page_size: u32,
) -> PageExtract {
    let listings: Vec<Listing> = locate_listing_array(payload)
        .into_iter()
        .filter_map(|item| normalize_listing_from_json(item, base))
        .collect();

    let total_results = extract_total_results(payload);

    let mut next_page = None;
    let paging_candidates = [
        payload.get("paging"),
        payload.get("pagination"),
        payload.pointer("/results/paging"),
        payload.pointer("/data/paging"),
    ];
    for paging in paging_candidates.into_iter().flatten() {
        if let Some(next) =
            get_str(Some(paging), "next").or_else(|| get_str(Some(paging), "nextPage"))
        {
            next_page = ensure_absolute_url(base, &next);
            break;
        }
    }

    if next_page.is_none() && !listings.is_empty() {
        next_page = derive_next_page_url(source_url, current_page, page_size);
    }

    PageExtract {
        listings,
        next_page,
        total_results,
    }
}

/// First numeric total among the known field paths.
pub fn extract_total_results(payload: &Value) -> Option<u64> {
    const PATHS: &[&str] = &[
        "/totalResults",
        "/results/total",
        "/data/total",
        "/paging/total",
        "/pagination/total",
    ];
    PATHS
        .iter()
        .find_map(|path| payload.pointer(path).and_then(Value::as_u64))
}

fn pick<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| obj.get(*key).filter(|v| !v.is_null()))
}

fn get_value<'a>(obj: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    obj?.get(key).filter(|v| !v.is_null())
}

fn get_str(obj: Option<&Value>, key: &str) -> Option<String> {
    get_value(obj, key).and_then(value_text)
}

fn get_i64(obj: Option<&Value>, key: &str) -> Option<i64> {
    get_value(obj, key).and_then(Value::as_i64)
}

fn bool_field(obj: &Value, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn first_image_url(media: &Value) -> Option<String> {
    match media {
        Value::Array(items) => items.first().and_then(|item| {
            value_text(item).or_else(|| get_str(Some(item), "url"))
        }),
        Value::Object(_) => media
            .pointer("/images/0/url")
            .and_then(value_text)
            .or_else(|| media.pointer("/images/0").and_then(value_text))
            .or_else(|| media.pointer("/mainImage/url").and_then(value_text)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://www.domain.com.au";

    #[test]
    fn test_normalize_modern_shape() {
        let raw = json!({
            "listing": {
                "listingId": 2019494941u64,
                "url": "/12-smith-st-carlton-vic-3053-2019494941",
                "propertyDetails": {
                    "propertyType": "House",
                    "bedrooms": 4,
                    "bathrooms": 2,
                    "carspaces": 1,
                    "landArea": 450
                },
                "address": {
                    "displayAddress": "12 Smith St",
                    "suburb": "Carlton",
                    "state": "VIC",
                    "postcode": "3053"
                },
                "priceDetails": {"displayPrice": "$500,000 - $600,000"},
                "advertiser": {
                    "contacts": [{"name": "Jo Agent"}],
                    "primaryAgency": {"name": "Example Realty"}
                },
                "geoLocation": {"latitude": -37.8, "longitude": 144.96},
                "media": {"images": [{"url": "https://img.example/1.jpg"}]},
                "tags": ["new"]
            }
        });

        let listing = normalize_listing_from_json(&raw, BASE).expect("should normalize");
        assert_eq!(listing.id, Some("2019494941".to_string()));
        assert_eq!(
            listing.url.as_deref(),
            Some("https://www.domain.com.au/12-smith-st-carlton-vic-3053-2019494941")
        );
        assert_eq!(listing.address, Some("12 Smith St".to_string()));
        assert_eq!(listing.suburb, Some("Carlton".to_string()));
        assert_eq!(listing.state, Some("VIC".to_string()));
        assert_eq!(listing.postcode, Some("3053".to_string()));
        assert_eq!(listing.price, Some("$500,000-$600,000".to_string()));
        assert_eq!(listing.property_type, Some("House".to_string()));
        assert_eq!(listing.beds, Some(4));
        assert_eq!(listing.baths, Some(2));
        assert_eq!(listing.parking, Some(1));
        assert_eq!(listing.land_size, Some("450m2".to_string()));
        assert_eq!(
            listing.image_url,
            Some("https://img.example/1.jpg".to_string())
        );
        assert_eq!(listing.agent, Some("Jo Agent".to_string()));
        assert_eq!(listing.agency, Some("Example Realty".to_string()));
        assert!(listing.is_new);
        assert_eq!(listing.source, BASE);
    }

    #[test]
    fn test_normalize_legacy_shape() {
        let raw = json!({
            "id": 1234567,
            "listingUrl": "/property/9-low-st-1234567",
            "details": {"beds": 2, "bathrooms": 1, "parkingSpaces": 1},
            "addressParts": {"street": "9 Low St", "locality": "Fitzroy", "region": "VIC", "postalCode": "3065"},
            "pricing": {"priceText": "$550000"},
            "agencyDetails": {"agencyName": "Old Agency"},
            "geo": {"lat": "-37.80", "lon": "144.97"},
            "mediaItems": ["https://img.example/a.jpg"]
        });

        let listing = normalize_listing_from_json(&raw, BASE).expect("should normalize");
        assert_eq!(listing.id, Some("1234567".to_string()));
        assert_eq!(listing.address, Some("9 Low St".to_string()));
        assert_eq!(listing.suburb, Some("Fitzroy".to_string()));
        assert_eq!(listing.state, Some("VIC".to_string()));
        assert_eq!(listing.postcode, Some("3065".to_string()));
        assert_eq!(listing.price, Some("$550,000".to_string()));
        assert_eq!(listing.beds, Some(2));
        assert_eq!(listing.baths, Some(1));
        assert_eq!(listing.parking, Some(1));
        assert_eq!(listing.agency, Some("Old Agency".to_string()));
        assert_eq!(listing.latitude, Some(json!("-37.80")));
        assert_eq!(
            listing.image_url,
            Some("https://img.example/a.jpg".to_string())
        );
        assert!(!listing.is_new);
    }

    #[test]
    fn test_normalize_rejects_missing_or_invalid_url() {
        let no_url = json!({"listingId": 1, "address": {"suburb": "Carlton"}});
        assert!(normalize_listing_from_json(&no_url, BASE).is_none());

        let search_url = json!({
            "listingId": 1,
            "url": "/sale/carlton?price=500000-600000"
        });
        assert!(normalize_listing_from_json(&search_url, BASE).is_none());
    }

    #[test]
    fn test_id_backfilled_from_url() {
        let raw = json!({"url": "/property/2-side-st-7654321"});
        let listing = normalize_listing_from_json(&raw, BASE).expect("should normalize");
        assert_eq!(listing.id, Some("7654321".to_string()));
    }

    #[test]
    fn test_optional_fields_stay_null() {
        let raw = json!({"url": "/property/2-side-st-7654321"});
        let listing = normalize_listing_from_json(&raw, BASE).expect("should normalize");
        assert!(listing.address.is_none());
        assert!(listing.price.is_none());
        assert!(listing.beds.is_none());
        assert!(listing.land_size.is_none());
        assert!(listing.latitude.is_none());
    }

    #[test]
    fn test_extract_listings_from_payload_with_paging() {
        let payload = json!({
            "results": [
                {"listingId": 1, "url": "/property/a-1111111"},
                {"listingId": 2, "url": "/property/b-2222222"}
            ],
            "totalResults": 120,
            "paging": {"next": "/sale/melbourne/?page=2"}
        });

        let extract =
            extract_listings_from_payload(&payload, BASE, "https://www.domain.com.au/sale/", 1, 40);
        assert_eq!(extract.listings.len(), 2);
        assert_eq!(extract.total_results, Some(120));
        assert_eq!(
            extract.next_page.as_deref(),
            Some("https://www.domain.com.au/sale/melbourne/?page=2")
        );
    }

    #[test]
    fn test_extract_listings_derives_next_page() {
        let payload = json!({
            "data": {
                "items": [{"listingId": 1, "url": "/property/a-1111111"}],
                "total": 55
            }
        });

        let extract = extract_listings_from_payload(
            &payload,
            BASE,
            "https://www.domain.com.au/sale/melbourne/",
            1,
            40,
        );
        assert_eq!(extract.listings.len(), 1);
        assert_eq!(extract.total_results, Some(55));
        assert_eq!(
            extract.next_page.as_deref(),
            Some("https://www.domain.com.au/sale/melbourne/?page=2&pageSize=40")
        );
    }
}
