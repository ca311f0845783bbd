// src/extract/state.rs

//! Embedded-state locator.
//!
//! The site inlines a JSON bootstrap payload in a `__NEXT_DATA__` script tag,
//! with the Apollo cache inside it carrying the listing entities. This is the
//! dominant fast path; a missing or malformed payload is an expected outcome,
//! not an error.

use std::collections::{HashSet, VecDeque};

use regex::Regex;
use serde_json::Value;

/// Entity-key prefixes that mark listing records in the Apollo cache.
const LISTING_KEY_PREFIXES: &[&str] = &[
    "Listing:",
    "PropertyListing:",
    "SearchListing:",
    "RentListing:",
    "SaleListing:",
];

/// Fields whose presence marks an object as listing-like.
const LISTING_MARKERS: &[&str] = &[
    "listingId",
    "listingSlug",
    "id",
    "propertyDetails",
    "address",
    "addressParts",
    "priceDetails",
    "media",
    "url",
];

/// Parsed embedded page state.
#[derive(Debug, Default)]
pub struct EmbeddedState {
    pub apollo_state: Option<Value>,
    pub page_props: Option<Value>,
    pub next_data: Option<Value>,
}

impl EmbeddedState {
    /// The richest payload available for generic traversal.
    pub fn payload(&self) -> Option<&Value> {
        self.page_props
            .as_ref()
            .or(self.next_data.as_ref())
            .or(self.apollo_state.as_ref())
    }
}

/// Locate and parse the embedded page state from raw markup.
pub fn extract_embedded_state(html: &str) -> Option<EmbeddedState> {
    if let Some(state) = extract_next_data(html) {
        return Some(state);
    }

    // Older page structures assign the state to a window global.
    let fallback_patterns = [
        r"(?s)window\.__APOLLO_STATE__\s*=\s*(\{.*?\})\s*;",
        r"(?s)window\.__INITIAL_STATE__\s*=\s*(\{.*?\})\s*;",
    ];
    for pattern in fallback_patterns {
        let Ok(re) = Regex::new(pattern) else { continue };
        if let Some(caps) = re.captures(html) {
            if let Some(parsed) = safe_json_parse(&caps[1]) {
                return Some(EmbeddedState {
                    apollo_state: Some(parsed),
                    ..EmbeddedState::default()
                });
            }
        }
    }

    None
}

fn extract_next_data(html: &str) -> Option<EmbeddedState> {
    let re = Regex::new(r#"(?is)<script[^>]+id="__NEXT_DATA__"[^>]*>(.*?)</script>"#).ok()?;
    let caps = re.captures(html)?;
    let next_data = safe_json_parse(&caps[1])?;

    let apollo_state = next_data
        .pointer("/props/pageProps/__APOLLO_STATE__")
        .or_else(|| next_data.pointer("/props/__APOLLO_STATE__"))
        .or_else(|| next_data.get("__APOLLO_STATE__"))
        .cloned();
    let page_props = next_data.pointer("/props/pageProps").cloned();

    Some(EmbeddedState {
        apollo_state,
        page_props,
        next_data: Some(next_data),
    })
}

pub(crate) fn safe_json_parse(raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(error) => {
            log::debug!("JSON parse failed: {error}");
            None
        }
    }
}

/// Collect Apollo cache values whose keys carry a listing entity prefix.
pub fn listings_from_apollo_state(apollo_state: &Value) -> Vec<&Value> {
    let Some(map) = apollo_state.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter(|(key, value)| {
            value.is_object() && LISTING_KEY_PREFIXES.iter().any(|p| key.starts_with(p))
        })
        .map(|(_, value)| value)
        .collect()
}

/// Does this object expose at least one recognizable listing field?
pub fn is_listing_like(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    LISTING_MARKERS
        .iter()
        .any(|key| obj.get(*key).is_some_and(|v| !v.is_null()))
}

/// Breadth-first search for the first array whose elements look like
/// listings.
///
/// The visited set is keyed by node address. serde_json documents are trees,
/// so this is a cheap bound on re-walking shared subtrees rather than a cycle
/// breaker.
pub fn locate_listing_array(payload: &Value) -> Vec<&Value> {
    let mut visited: HashSet<usize> = HashSet::new();
    let mut queue: VecDeque<&Value> = VecDeque::new();
    queue.push_back(payload);

    while let Some(current) = queue.pop_front() {
        if (current.is_object() || current.is_array())
            && !visited.insert(current as *const Value as usize)
        {
            continue;
        }

        if let Some(items) = current.as_array() {
            let candidates: Vec<&Value> = items.iter().filter(|v| is_listing_like(v)).collect();
            if !candidates.is_empty() {
                return candidates;
            }
        }

        enqueue_children(current, &mut queue);
    }

    Vec::new()
}

/// Breadth-first search for the first listing-like object anywhere in the
/// payload.
pub fn find_first_listing_object(payload: &Value) -> Option<&Value> {
    let mut visited: HashSet<usize> = HashSet::new();
    let mut queue: VecDeque<&Value> = VecDeque::new();
    queue.push_back(payload);

    while let Some(current) = queue.pop_front() {
        if (current.is_object() || current.is_array())
            && !visited.insert(current as *const Value as usize)
        {
            continue;
        }

        if is_listing_like(current) {
            return Some(current);
        }

        enqueue_children(current, &mut queue);
    }

    None
}

fn enqueue_children<'a>(current: &'a Value, queue: &mut VecDeque<&'a Value>) {
    match current {
        Value::Object(map) => {
            queue.extend(map.values().filter(|v| v.is_object() || v.is_array()))
        }
        Value::Array(items) => {
            queue.extend(items.iter().filter(|v| v.is_object() || v.is_array()))
        }
        _ => {}
    }
}
