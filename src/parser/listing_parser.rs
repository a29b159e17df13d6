// Saved listing page -> RawListing
use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::model::{ParserError, RawListing};
use crate::normalizer::{MAX_MILES, PRICE_RANGE_USD};
use crate::utils::{host_of, non_blank};
use crate::vehicles::VehicleMatcher;

pub trait Parser {
    /// `origin` is where the page came from; used when the page names no URL.
    fn parse(&self, html: &str, origin: &str) -> Result<RawListing, ParserError>;
}

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(199\d|20[0-2]\d)\b").expect("valid year regex"));
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?(\d{1,3}(?:,\d{3})+|\d{4,6})\b").expect("valid price regex")
});
static MILES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d{1,6})\s*(?:miles?|mi)\b").expect("valid miles regex")
});
static KMILES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:\.\d)?)\s*k\s*(?:miles?|mi)?\b").expect("valid k-miles regex")
});
static KM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d{1,6})\s*km\b").expect("valid km regex")
});
static VIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-HJ-NPR-Z0-9]{17}\b").expect("valid vin regex"));
static TRANSMISSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:\d-speed\s+)?(pdk|tiptronic(?:\s+s)?|automatic|manual)\b")
        .expect("valid transmission regex")
});

fn label_regex(label: &str) -> Regex {
    Regex::new(&format!(r"(?i)^{label}\b\s*:?\s*(.*)$")).expect("valid label regex")
}

static MILEAGE_LABEL: LazyLock<Regex> = LazyLock::new(|| label_regex("mileage"));
static VIN_LABEL: LazyLock<Regex> = LazyLock::new(|| label_regex("vin"));
static TRANSMISSION_LABEL: LazyLock<Regex> = LazyLock::new(|| label_regex("transmission"));
static EXTERIOR_LABEL: LazyLock<Regex> =
    LazyLock::new(|| label_regex(r"exterior(?:\s+colou?r)?"));
static INTERIOR_LABEL: LazyLock<Regex> =
    LazyLock::new(|| label_regex(r"interior(?:\s+colou?r)?"));
static LOCATION_LABEL: LazyLock<Regex> = LazyLock::new(|| label_regex("location"));
static OPTIONS_LABEL: LazyLock<Regex> = LazyLock::new(|| label_regex("(?:options|features)"));

const KM_TO_MILES: f64 = 0.621371;

pub struct ListingPageParser {
    vehicles: Arc<VehicleMatcher>,
}

impl ListingPageParser {
    pub fn new(vehicles: Arc<VehicleMatcher>) -> Self {
        Self { vehicles }
    }
}

fn selector(css: &str) -> Result<Selector, ParserError> {
    Selector::parse(css).map_err(|e| ParserError::Selector(e.to_string()))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Parser for ListingPageParser {
    fn parse(&self, html: &str, origin: &str) -> Result<RawListing, ParserError> {
        let document = Html::parse_document(html);

        let body_selector = selector("body")?;
        let title_selector = selector("h1, title")?;
        let canonical_selector = selector(r#"link[rel="canonical"]"#)?;
        let og_url_selector = selector(r#"meta[property="og:url"]"#)?;
        let options_selector = selector(r#"[class*="option"] li, [class*="feature"] li"#)?;

        let listing_url = document
            .select(&canonical_selector)
            .find_map(|e| e.value().attr("href"))
            .or_else(|| {
                document
                    .select(&og_url_selector)
                    .find_map(|e| e.value().attr("content"))
            })
            .and_then(|u| non_blank(Some(u)))
            .unwrap_or(origin)
            .to_string();
        let source = host_of(&listing_url).unwrap_or_else(|| "snapshot".to_string());
        let mut raw = RawListing::new(source, listing_url);

        // One line per text node, so labels and values stay apart.
        let lines: Vec<String> = document
            .select(&body_selector)
            .flat_map(|body| body.text())
            .flat_map(|t| t.lines())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if lines.is_empty() {
            raw.error = Some(ParserError::MissingField("body text".into()).to_string());
            return Ok(raw);
        }
        let body = lines.join("\n");
        let title = document
            .select(&title_selector)
            .map(element_text)
            .find(|t| !t.is_empty())
            .unwrap_or_default();

        let year_text = YEAR_RE
            .captures(&title)
            .or_else(|| YEAR_RE.captures(&body))
            .map(|c| c[1].to_string());
        let year = year_text.as_deref().and_then(|y| y.parse().ok());
        raw.year = year_text;

        let (model, trim) = self.vehicles.detect_model_and_trim(&title, year);
        let (model, trim) = match model {
            Some(_) => (model, trim),
            None => self.vehicles.detect_model_and_trim(&body, year),
        };
        raw.model = model;
        raw.trim = trim;

        raw.price_usd = extract_price(&title).or_else(|| extract_price(&body));
        raw.mileage = labelled(&lines, &MILEAGE_LABEL)
            .and_then(|m| extract_mileage(&m))
            .or_else(|| extract_mileage(&body))
            .map(|m| m.to_string());
        raw.vin = labelled(&lines, &VIN_LABEL)
            .and_then(|v| find_vin(&v))
            .or_else(|| find_vin(&body));
        raw.transmission_raw = labelled(&lines, &TRANSMISSION_LABEL).or_else(|| {
            TRANSMISSION_RE
                .find(&body)
                .map(|m| m.as_str().to_string())
        });
        raw.exterior_color = labelled(&lines, &EXTERIOR_LABEL);
        raw.interior_color = labelled(&lines, &INTERIOR_LABEL);
        raw.location = labelled(&lines, &LOCATION_LABEL);

        let items: Vec<String> = document
            .select(&options_selector)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        raw.raw_options = if items.is_empty() {
            labelled(&lines, &OPTIONS_LABEL)
        } else {
            Some(items.join(", "))
        };

        Ok(raw)
    }
}

/// Value after `label` on the same line, or on the next line when the label
/// stands alone (`<dt>Label</dt><dd>Value</dd>`).
fn labelled(lines: &[String], label: &Regex) -> Option<String> {
    lines.iter().enumerate().find_map(|(i, line)| {
        let rest = label.captures(line)?.get(1)?.as_str().trim().to_string();
        if rest.is_empty() {
            lines.get(i + 1).cloned()
        } else {
            Some(rest)
        }
    })
}

fn extract_price(text: &str) -> Option<String> {
    PRICE_RE.captures_iter(text).find_map(|c| {
        let usd: i64 = c[1].replace(',', "").parse().ok()?;
        PRICE_RANGE_USD.contains(&usd).then(|| usd.to_string())
    })
}

fn extract_mileage(text: &str) -> Option<u32> {
    let plain = |c: regex::Captures<'_>| c[1].replace(',', "").parse::<u32>().ok();
    MILES_RE
        .captures(text)
        .and_then(plain)
        .or_else(|| {
            KM_RE
                .captures(text)
                .and_then(plain)
                .map(|km| (f64::from(km) * KM_TO_MILES) as u32)
        })
        .or_else(|| {
            KMILES_RE
                .captures(text)
                .and_then(|c| c[1].parse::<f64>().ok())
                .map(|k| (k * 1000.0).round() as u32)
        })
        .filter(|m| *m <= MAX_MILES)
}

fn find_vin(text: &str) -> Option<String> {
    VIN_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|v| {
            v.chars().any(|c| c.is_ascii_digit()) && v.chars().any(|c| c.is_ascii_alphabetic())
        })
        .map(str::to_string)
}
