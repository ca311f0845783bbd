// src/extract/mod.rs

//! Extraction strategies over one page of markup or one JSON payload.

pub mod html;
pub mod json;
pub mod jsonld;
pub mod state;

use serde_json::Value;

use crate::models::Listing;

/// What one extraction pass recovered from a page or payload.
#[derive(Debug, Default)]
pub struct PageExtract {
    pub listings: Vec<Listing>,
    pub next_page: Option<String>,
    pub total_results: Option<u64>,
}

/// Non-empty text from a string or numeric JSON value.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
