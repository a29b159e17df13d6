// Core structs: RawListing, NormalizedListing, ValuedListing, RankedRow
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::catalog::OptionDefinition;
use crate::utils::non_blank;

/// One scraped listing page, as handed over by the collector/scraper.
///
/// Only `source` and `listing_url` are required. Every other field stays
/// `None` when the page did not carry it; nothing is synthesized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    #[serde(default)]
    pub timestamp_run_id: Option<String>,
    pub source: String,
    pub listing_url: String,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub trim: Option<String>,
    #[serde(default)]
    pub transmission_raw: Option<String>,
    #[serde(default)]
    pub mileage: Option<String>,
    #[serde(default)]
    pub price_usd: Option<String>,
    #[serde(default)]
    pub exterior_color: Option<String>,
    #[serde(default)]
    pub interior_color: Option<String>,
    #[serde(default)]
    pub raw_options: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RawListing {
    pub fn new(source: impl Into<String>, listing_url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            listing_url: listing_url.into(),
            ..Self::default()
        }
    }

    /// A row the scraper marked as failed. Kept for auditing, never valued.
    pub fn is_failed(&self) -> bool {
        non_blank(self.error.as_deref()).is_some()
    }

    /// Number of populated listing fields. The run id and the error marker
    /// are bookkeeping and do not count.
    pub fn filled_field_count(&self) -> usize {
        let required = [self.source.as_str(), self.listing_url.as_str()]
            .iter()
            .filter(|v| !v.trim().is_empty())
            .count();
        let optional = [
            &self.vin,
            &self.year,
            &self.model,
            &self.trim,
            &self.transmission_raw,
            &self.mileage,
            &self.price_usd,
            &self.exterior_color,
            &self.interior_color,
            &self.raw_options,
            &self.location,
        ]
        .iter()
        .filter(|v| non_blank(v.as_deref()).is_some())
        .count();
        required + optional
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transmission {
    Automatic,
    Manual,
}

impl Transmission {
    pub fn as_str(self) -> &'static str {
        match self {
            Transmission::Automatic => "Automatic",
            Transmission::Manual => "Manual",
        }
    }
}

impl fmt::Display for Transmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorBucket {
    Monochrome,
    Color,
}

impl ColorBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorBucket::Monochrome => "Monochrome",
            ColorBucket::Color => "Color",
        }
    }
}

/// Six fixed mileage bands; lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MileageBand {
    #[serde(rename = "<40k")]
    Under40k,
    #[serde(rename = "40-59k")]
    From40k,
    #[serde(rename = "60-79k")]
    From60k,
    #[serde(rename = "80-99k")]
    From80k,
    #[serde(rename = "100-119k")]
    From100k,
    #[serde(rename = "120k+")]
    From120k,
}

impl MileageBand {
    pub const ALL: [MileageBand; 6] = [
        MileageBand::Under40k,
        MileageBand::From40k,
        MileageBand::From60k,
        MileageBand::From80k,
        MileageBand::From100k,
        MileageBand::From120k,
    ];

    /// Band used for computation when the listing has no mileage.
    pub const NEUTRAL: MileageBand = MileageBand::From60k;

    pub fn from_miles(miles: u32) -> Self {
        match miles {
            0..40_000 => MileageBand::Under40k,
            40_000..60_000 => MileageBand::From40k,
            60_000..80_000 => MileageBand::From60k,
            80_000..100_000 => MileageBand::From80k,
            100_000..120_000 => MileageBand::From100k,
            _ => MileageBand::From120k,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MileageBand::Under40k => "<40k",
            MileageBand::From40k => "40-59k",
            MileageBand::From60k => "60-79k",
            MileageBand::From80k => "80-99k",
            MileageBand::From100k => "100-119k",
            MileageBand::From120k => "120k+",
        }
    }
}

/// A catalog option matched on one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedOption {
    pub definition: Arc<OptionDefinition>,
    /// Standard equipment on the listing's trim: shown, never credited.
    pub is_standard_suppressed: bool,
}

impl DetectedOption {
    pub fn credited_value_usd(&self) -> i64 {
        if self.is_standard_suppressed {
            0
        } else {
            self.definition.value_usd
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedListing {
    pub raw: RawListing,
    pub year: Option<i32>,
    pub model: Option<String>,
    pub trim: Option<String>,
    pub mileage: Option<u32>,
    pub asking_price_usd: Option<i64>,
    pub transmission: Option<Transmission>,
    pub exterior_bucket: Option<ColorBucket>,
    pub interior_bucket: Option<ColorBucket>,
    pub model_trim_display: String,
    /// Neutral band when mileage is missing; display code must check `mileage`.
    pub mileage_band: MileageBand,
    pub detected_options: Vec<DetectedOption>,
    pub options_total_usd: i64,
}

impl NormalizedListing {
    pub fn options_list(&self) -> String {
        self.detected_options
            .iter()
            .map(|d| d.definition.display.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valuation {
    FairValue {
        fair_value_usd: i64,
        /// `None` when the listing has no asking price.
        deal_delta_usd: Option<i64>,
    },
    MsrpTotal {
        total_options_msrp: i64,
    },
}

impl Valuation {
    /// The metric the ranker sorts on, descending.
    pub fn primary_metric(&self) -> Option<i64> {
        match *self {
            Valuation::FairValue { deal_delta_usd, .. } => deal_delta_usd,
            Valuation::MsrpTotal { total_options_msrp } => Some(total_options_msrp),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValuedListing {
    pub listing: NormalizedListing,
    pub valuation: Valuation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealQuality {
    #[serde(rename = "Excellent Deal")]
    Excellent,
    #[serde(rename = "Good Deal")]
    Good,
    #[serde(rename = "Fair Price")]
    Fair,
    #[serde(rename = "Overpriced")]
    Overpriced,
}

impl DealQuality {
    pub fn from_delta(delta_usd: i64) -> Self {
        if delta_usd > 1000 {
            DealQuality::Excellent
        } else if delta_usd > 0 {
            DealQuality::Good
        } else if delta_usd > -1000 {
            DealQuality::Fair
        } else {
            DealQuality::Overpriced
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DealQuality::Excellent => "Excellent Deal",
            DealQuality::Good => "Good Deal",
            DealQuality::Fair => "Fair Price",
            DealQuality::Overpriced => "Overpriced",
        }
    }
}

/// One row of the ranked output table. Numbers are raw integers; missing
/// values serialize as empty cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub rank: usize,
    pub year: Option<i32>,
    pub model: Option<String>,
    pub trim: Option<String>,
    pub model_trim: String,
    pub transmission: Option<Transmission>,
    pub asking_price_usd: Option<i64>,
    pub mileage: Option<u32>,
    pub mileage_band: Option<MileageBand>,
    pub total_options_msrp: Option<i64>,
    pub fair_value_usd: Option<i64>,
    pub deal_delta_usd: Option<i64>,
    pub deal_quality: Option<DealQuality>,
    pub options_list: String,
    pub exterior: Option<String>,
    pub interior: Option<String>,
    pub exterior_bucket: Option<ColorBucket>,
    pub interior_bucket: Option<ColorBucket>,
    pub vin: Option<String>,
    pub location: Option<String>,
    pub source: String,
    pub listing_url: String,
    pub source_url: String,
}

impl RankedRow {
    pub fn from_valued(rank: usize, valued: &ValuedListing) -> Self {
        let l = &valued.listing;
        let (total_options_msrp, fair_value_usd, deal_delta_usd) = match valued.valuation {
            Valuation::FairValue {
                fair_value_usd,
                deal_delta_usd,
            } => (None, Some(fair_value_usd), deal_delta_usd),
            Valuation::MsrpTotal { total_options_msrp } => (Some(total_options_msrp), None, None),
        };
        let text = |v: &Option<String>| non_blank(v.as_deref()).map(str::to_string);

        RankedRow {
            rank,
            year: l.year,
            model: l.model.clone(),
            trim: l.trim.clone(),
            model_trim: l.model_trim_display.clone(),
            transmission: l.transmission,
            asking_price_usd: l.asking_price_usd,
            mileage: l.mileage,
            mileage_band: l.mileage.map(|_| l.mileage_band),
            total_options_msrp,
            fair_value_usd,
            deal_delta_usd,
            deal_quality: deal_delta_usd.map(DealQuality::from_delta),
            options_list: l.options_list(),
            exterior: text(&l.raw.exterior_color),
            interior: text(&l.raw.interior_color),
            exterior_bucket: l.exterior_bucket,
            interior_bucket: l.interior_bucket,
            vin: text(&l.raw.vin),
            location: text(&l.raw.location),
            source: l.raw.source.clone(),
            listing_url: l.raw.listing_url.clone(),
            source_url: l.raw.listing_url.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("option {option_id}: invalid pattern {pattern:?}: {source}")]
    Pattern {
        option_id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid vehicle synonym pattern {pattern:?}: {source}")]
    Synonym {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("parser error: {0}")]
    Parser(#[from] ParserError),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("invalid selector: {0}")]
    Selector(String),
    #[error("missing field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
