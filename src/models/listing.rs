// src/models/listing.rs

//! Canonical listing record.
//!
//! Every extraction strategy converges on this shape; downstream code never
//! has to know which strategy produced a record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::url::extract_listing_id;

/// A normalized property listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Listing {
    /// Source identifier, backfilled from the URL when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Absolute listing URL; the pipeline only accepts records with one
    pub url: Option<String>,

    pub address: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,

    /// Formatted display price, range-aware
    pub price: Option<String>,
    pub property_type: Option<String>,

    pub beds: Option<i64>,
    pub baths: Option<i64>,
    pub parking: Option<i64>,

    /// Unit-suffixed land size, e.g. "450m2"
    pub land_size: Option<String>,

    pub image_url: Option<String>,
    pub agent: Option<String>,
    pub agency: Option<String>,

    /// String or numeric coordinate, passed through unvalidated
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,

    pub is_new: bool,

    /// Origin host
    pub source: String,

    /// Capture timestamp, RFC 3339
    pub scraped_at: String,

    // Detail-page fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inspection_times: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Listing {
    /// Dedup key: explicit id, else an id recovered from the URL, else the
    /// URL itself. The recovered id is written back to the record.
    pub fn dedup_key(&mut self) -> Option<String> {
        if self.id.is_none() {
            self.id = self.url.as_deref().and_then(extract_listing_id);
        }
        self.id.clone().or_else(|| self.url.clone())
    }

    /// Fill fields this record is missing from `other`. Values obtained
    /// earlier in the pipeline are never overwritten.
    pub fn merge_missing(&mut self, other: Listing) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }

        fill(&mut self.id, other.id);
        fill(&mut self.url, other.url);
        fill(&mut self.address, other.address);
        fill(&mut self.suburb, other.suburb);
        fill(&mut self.state, other.state);
        fill(&mut self.postcode, other.postcode);
        fill(&mut self.price, other.price);
        fill(&mut self.property_type, other.property_type);
        fill(&mut self.beds, other.beds);
        fill(&mut self.baths, other.baths);
        fill(&mut self.parking, other.parking);
        fill(&mut self.land_size, other.land_size);
        fill(&mut self.image_url, other.image_url);
        fill(&mut self.agent, other.agent);
        fill(&mut self.agency, other.agency);
        fill(&mut self.latitude, other.latitude);
        fill(&mut self.longitude, other.longitude);
        fill(&mut self.description, other.description);

        self.is_new = self.is_new || other.is_new;

        if self.source.is_empty() {
            self.source = other.source;
        }
        if self.scraped_at.is_empty() {
            self.scraped_at = other.scraped_at;
        }
        if self.inspection_times.is_empty() {
            self.inspection_times = other.inspection_times;
        }
        if self.images.is_empty() {
            self.images = other.images;
        }
        if self.features.is_empty() {
            self.features = other.features;
        }
    }

    /// Backfill capture metadata and the image fallback before the record
    /// leaves the pipeline.
    pub fn ensure_metadata(&mut self, base: &str) {
        if self.image_url.is_none() {
            self.image_url = self.images.first().cloned();
        }
        if self.scraped_at.is_empty() {
            self.scraped_at = Utc::now().to_rfc3339();
        }
        if self.source.is_empty() {
            self.source = base.trim_end_matches('/').to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_with_url(url: &str) -> Listing {
        Listing {
            url: Some(url.to_string()),
            ..Listing::default()
        }
    }

    #[test]
    fn test_dedup_key_prefers_id() {
        let mut listing = Listing {
            id: Some("42".to_string()),
            url: Some("https://www.domain.com.au/property/x-1234567".to_string()),
            ..Listing::default()
        };
        assert_eq!(listing.dedup_key(), Some("42".to_string()));
    }

    #[test]
    fn test_dedup_key_backfills_id_from_url() {
        let mut listing = listing_with_url("https://www.domain.com.au/property/x-1234567");
        assert_eq!(listing.dedup_key(), Some("1234567".to_string()));
        assert_eq!(listing.id, Some("1234567".to_string()));
    }

    #[test]
    fn test_dedup_key_falls_back_to_url() {
        let mut listing = listing_with_url("https://www.domain.com.au/property/no-digits");
        assert_eq!(
            listing.dedup_key(),
            Some("https://www.domain.com.au/property/no-digits".to_string())
        );
        assert_eq!(listing.dedup_key(), listing.url);
    }

    #[test]
    fn test_merge_missing_never_overwrites() {
        let mut record = Listing {
            price: Some("$550,000".to_string()),
            beds: Some(3),
            ..Listing::default()
        };
        let enrichment = Listing {
            price: Some("$600,000".to_string()),
            beds: Some(4),
            baths: Some(2),
            description: Some("Sunny terrace".to_string()),
            ..Listing::default()
        };

        record.merge_missing(enrichment);

        assert_eq!(record.price, Some("$550,000".to_string()));
        assert_eq!(record.beds, Some(3));
        assert_eq!(record.baths, Some(2));
        assert_eq!(record.description, Some("Sunny terrace".to_string()));
    }

    #[test]
    fn test_ensure_metadata() {
        let mut listing = Listing {
            images: vec!["https://img.example/1.jpg".to_string()],
            ..Listing::default()
        };
        listing.ensure_metadata("https://www.domain.com.au/");
        assert_eq!(listing.image_url, Some("https://img.example/1.jpg".to_string()));
        assert_eq!(listing.source, "https://www.domain.com.au");
        assert!(!listing.scraped_at.is_empty());
    }
}
