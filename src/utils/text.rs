// src/utils/text.rs

//! Text recovery helpers shared by the extraction strategies.

use regex::Regex;

/// Collapse runs of whitespace and trim. Returns `None` when nothing is left.
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Format an integer with comma thousands separators.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Normalize free-form price text.
///
/// Ranges like "$500,000 - $600,000" come back as "$500,000-$600,000", single
/// amounts are reformatted with separators, and text without a usable number
/// ("Contact Agent", "Auction") passes through cleaned but unchanged.
pub fn normalize_price(text: &str) -> Option<String> {
    let cleaned = clean_text(text)?;

    if let Ok(range) = Regex::new(r"(?i)\$?([\d,]+)\s*(?:-|to)\s*\$?([\d,]+)") {
        if let Some(caps) = range.captures(&cleaned) {
            if let (Some(min), Some(max)) = (parse_amount(&caps[1]), parse_amount(&caps[2])) {
                return Some(format!(
                    "${}-${}",
                    format_thousands(min),
                    format_thousands(max)
                ));
            }
        }
    }

    if let Ok(single) = Regex::new(r"\$?(\d[\d,]*)") {
        if let Some(caps) = single.captures(&cleaned) {
            if let Some(amount) = parse_amount(&caps[1]) {
                return Some(format!("${}", format_thousands(amount)));
            }
        }
    }

    Some(cleaned)
}

fn parse_amount(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

/// Pull a unit-suffixed land size like "450m2" out of free text.
pub fn extract_land_size(text: &str) -> Option<String> {
    let cleaned = clean_text(text)?;
    let re = Regex::new(r"(?i)([\d,.]+)\s*(m2|sqm|m²)").ok()?;
    let caps = re.captures(&cleaned)?;
    Some(format!("{}m2", caps[1].replace(',', "")))
}

/// Feature counts recovered from card text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeatureCounts {
    pub beds: Option<i64>,
    pub baths: Option<i64>,
    pub parking: Option<i64>,
    pub land_size: Option<String>,
}

/// Scan text for bed/bath/parking counts and a land size.
///
/// Each field is searched independently because cards do not guarantee a
/// single enumerable features block.
pub fn parse_feature_counts(text: &str) -> FeatureCounts {
    let land_size = Regex::new(r"(?i)([\d,.]+)\s*m")
        .ok()
        .and_then(|re| re.captures(text).map(|caps| format!("{}m2", &caps[1])));

    FeatureCounts {
        beds: capture_int(text, r"(?i)(\d+)\s*Bed"),
        baths: capture_int(text, r"(?i)(\d+)\s*Bath"),
        parking: capture_int(text, r"(?i)(\d+)\s*Parking"),
        land_size,
    }
}

fn capture_int(text: &str, pattern: &str) -> Option<i64> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}
