// src/utils/url.rs

//! URL helpers shared by the extraction strategies and the crawl loop.

use regex::Regex;
use url::Url;

/// Make a possibly relative href absolute against the site base.
pub fn ensure_absolute_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = base.trim_end_matches('/');
    if href.starts_with('/') {
        Some(format!("{base}{href}"))
    } else {
        Some(format!("{base}/{href}"))
    }
}

/// Does this URL look like an individual listing page?
///
/// The bare site root is never a listing. `/sale/` and `/rent/` URLs carrying
/// a query string are search-result pages, not listings, even when they also
/// carry a numeric token.
pub fn is_likely_listing_url(base: &str, url: &str) -> bool {
    let Some(normalized) = ensure_absolute_url(base, url) else {
        return false;
    };
    let root = base.trim_end_matches('/');
    if normalized == root || normalized == format!("{root}/") {
        return false;
    }

    let lower = normalized.to_lowercase();
    if lower.contains("/sale/") && lower.contains('?') {
        return false;
    }
    if lower.contains("/rent/") && lower.contains('?') {
        return false;
    }

    lower.contains("/property/") || lower.contains("/project/") || has_listing_id_token(&lower)
}

/// A 6+ digit token terminated by a path/query/fragment boundary.
fn has_listing_id_token(url: &str) -> bool {
    Regex::new(r"-\d{6,}([/?#]|$)")
        .map(|re| re.is_match(url))
        .unwrap_or(false)
}

/// Pick the most listing-like href from a card's anchors.
///
/// Skips mailto/tel/fragment-only links, prefers hrefs matching the listing
/// patterns, and falls back to the first remaining href.
pub fn pick_listing_href(hrefs: &[String]) -> Option<String> {
    let filtered: Vec<&String> = hrefs
        .iter()
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .collect();

    let candidate = filtered.iter().copied().find(|href| {
        let lower = href.to_lowercase();
        if lower.starts_with("mailto:") || lower.starts_with("tel:") {
            return false;
        }
        lower.contains("/property/") || lower.contains("/project/") || has_listing_id_token(&lower)
    });

    candidate.or_else(|| filtered.first().copied()).cloned()
}

/// Extract a stable listing identifier from a URL (6+ digit token).
pub fn extract_listing_id(url: &str) -> Option<String> {
    let re = Regex::new(r"(\d{6,})([/?#]|$)").ok()?;
    re.captures(url).map(|caps| caps[1].to_string())
}

/// Synthesize the next page URL by bumping the `page` query parameter and
/// making sure a page size is set.
pub fn derive_next_page_url(url: &str, current_page: u32, page_size: u32) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let current = if current_page > 0 {
        current_page
    } else {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(1)
    };

    set_query_param(&mut parsed, "page", &(current + 1).to_string());
    ensure_query_param(&mut parsed, "pageSize", &page_size.to_string());
    Some(parsed.to_string())
}

/// Alternate JSON endpoints derived from a search URL, in probe order.
pub fn build_api_candidates(base: &str, url: &str, page: u32, page_size: u32) -> Vec<String> {
    let Ok(mut parsed) = Url::parse(url) else {
        return Vec::new();
    };

    let listing_type = parsed
        .query_pairs()
        .find(|(key, _)| key == "listingType")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| {
            if parsed.path().to_lowercase().contains("/rent") {
                "Rent".to_string()
            } else {
                "Sale".to_string()
            }
        });

    set_query_param(&mut parsed, "page", &page.to_string());
    ensure_query_param(&mut parsed, "pageSize", &page_size.to_string());
    set_query_param(&mut parsed, "listingType", &listing_type);

    let query = parsed.query().unwrap_or("").to_string();
    let base = base.trim_end_matches('/');
    vec![
        format!("{base}/srp/api/search?{query}"),
        format!("{base}/srp/api/listings?{query}"),
        format!("{base}/map/api/search?{query}"),
    ]
}

/// Replace a query parameter, preserving the rest of the query string.
pub fn set_query_param(url: &mut Url, key: &str, value: &str) {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair(key, value);
}

fn ensure_query_param(url: &mut Url, key: &str, value: &str) {
    let present = url.query_pairs().any(|(k, _)| k == key);
    if !present {
        url.query_pairs_mut().append_pair(key, value);
    }
}

/// Extract the host from a URL string.
pub fn get_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}
