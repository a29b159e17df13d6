use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::Settings;
use crate::model::{ColorBucket, MileageBand, NormalizedListing, RawListing, Transmission};
use crate::options::OptionsDetector;
use crate::options::pricing::options_total_usd;
use crate::utils::non_blank;
use crate::vehicles::VehicleMatcher;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid year regex"));
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(k)?$").expect("valid number regex"));

/// Asking prices outside this range are treated as missing.
pub const PRICE_RANGE_USD: RangeInclusive<i64> = 1_000..=500_000;
pub const MAX_MILES: u32 = 500_000;

const MONOCHROME_TERMS: [&str; 5] = ["white", "black", "gray", "grey", "silver"];

pub fn normalize_all(raws: &[RawListing], settings: &Settings) -> Vec<NormalizedListing> {
    let normalizer = Normalizer::new(settings);
    raws.iter().map(|raw| normalizer.normalize(raw)).collect()
}

/// Turns raw scraped fields into canonical listing data.
pub struct Normalizer<'a> {
    detector: OptionsDetector,
    vehicles: &'a VehicleMatcher,
}

impl<'a> Normalizer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            detector: OptionsDetector::new(settings.catalog.clone()),
            vehicles: &settings.vehicles,
        }
    }

    pub fn normalize(&self, raw: &RawListing) -> NormalizedListing {
        let year = parse_year(raw.year.as_deref());
        let (model, trim) = self.model_and_trim(raw, year);
        let mileage = parse_mileage(raw.mileage.as_deref());
        let asking_price_usd = parse_price(raw.price_usd.as_deref());

        if non_blank(raw.mileage.as_deref()).is_some() && mileage.is_none() {
            debug!("Unusable mileage {:?} on {}", raw.mileage, raw.listing_url);
        }
        if non_blank(raw.price_usd.as_deref()).is_some() && asking_price_usd.is_none() {
            debug!("Unusable price {:?} on {}", raw.price_usd, raw.listing_url);
        }

        let detected_options = self
            .detector
            .detect(raw.raw_options.as_deref().unwrap_or_default(), trim.as_deref());
        let options_total_usd = options_total_usd(&detected_options);

        NormalizedListing {
            raw: raw.clone(),
            year,
            model_trim_display: model_trim_display(year, model.as_deref(), trim.as_deref()),
            model,
            trim,
            mileage,
            asking_price_usd,
            transmission: normalize_transmission(raw.transmission_raw.as_deref()),
            exterior_bucket: color_bucket(raw.exterior_color.as_deref()),
            interior_bucket: color_bucket(raw.interior_color.as_deref()),
            mileage_band: mileage.map_or(MileageBand::NEUTRAL, MileageBand::from_miles),
            detected_options,
            options_total_usd,
        }
    }

    // Canonical model name from the vehicle catalog when it recognises the
    // text; the trim is read from the model text only when the row has none.
    fn model_and_trim(
        &self,
        raw: &RawListing,
        year: Option<i32>,
    ) -> (Option<String>, Option<String>) {
        let raw_model = non_blank(raw.model.as_deref());
        let raw_trim = non_blank(raw.trim.as_deref()).map(str::to_string);

        let Some(text) = raw_model else {
            return (None, raw_trim);
        };
        let (model, detected_trim) = self.vehicles.detect_model_and_trim(text, year);
        (
            model.or_else(|| Some(text.to_string())),
            raw_trim.or(detected_trim),
        )
    }
}

/// First plausible four-digit year in the text.
pub fn parse_year(raw: Option<&str>) -> Option<i32> {
    let text = non_blank(raw)?;
    YEAR_RE.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Whole-dollar or whole-mile figure from text like `$32,500`, `45k mi`.
/// Anything that is not clearly a number is `None`.
pub fn parse_whole_number(raw: Option<&str>) -> Option<i64> {
    let text = non_blank(raw)?.to_lowercase();
    let mut cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    for suffix in ["miles", "mi", "usd"] {
        if let Some(stripped) = cleaned.strip_suffix(suffix) {
            cleaned = stripped.to_string();
            break;
        }
    }

    let caps = NUMBER_RE.captures(&cleaned)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let value = if caps.get(2).is_some() { value * 1000.0 } else { value };
    if !value.is_finite() || value >= i64::MAX as f64 {
        return None;
    }
    Some(value.round() as i64)
}

/// Asking price in dollars, `None` when unparseable or implausible.
pub fn parse_price(raw: Option<&str>) -> Option<i64> {
    parse_whole_number(raw).filter(|usd| PRICE_RANGE_USD.contains(usd))
}

pub fn parse_mileage(raw: Option<&str>) -> Option<u32> {
    parse_whole_number(raw)
        .and_then(|m| u32::try_from(m).ok())
        .filter(|m| *m <= MAX_MILES)
}

pub fn normalize_transmission(raw: Option<&str>) -> Option<Transmission> {
    let text = non_blank(raw)?.to_lowercase();
    if ["pdk", "automatic", "tiptronic", "auto"]
        .iter()
        .any(|t| text.contains(t))
    {
        Some(Transmission::Automatic)
    } else if text.contains("manual") {
        Some(Transmission::Manual)
    } else {
        None
    }
}

pub fn color_bucket(raw: Option<&str>) -> Option<ColorBucket> {
    let text = non_blank(raw)?.to_lowercase();
    if MONOCHROME_TERMS.iter().any(|t| text.contains(t)) {
        Some(ColorBucket::Monochrome)
    } else {
        Some(ColorBucket::Color)
    }
}

/// "YYYY Model Trim" with missing parts and a "Base" trim left out.
pub fn model_trim_display(year: Option<i32>, model: Option<&str>, trim: Option<&str>) -> String {
    let year = year.map(|y| y.to_string());
    let trim = trim.filter(|t| !t.trim().eq_ignore_ascii_case("base"));
    [year.as_deref(), model, trim]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn settings() -> Settings {
        Settings::from_config(AppConfig::default()).unwrap()
    }

    #[test]
    fn numbers_tolerate_formatting() {
        assert_eq!(parse_whole_number(Some("$32,500")), Some(32500));
        assert_eq!(parse_whole_number(Some("45k")), Some(45000));
        assert_eq!(parse_whole_number(Some("62,100 miles")), Some(62100));
        assert_eq!(parse_whole_number(Some("38.5K mi")), Some(38500));
        assert_eq!(parse_whole_number(Some("call for price")), None);
        assert_eq!(parse_whole_number(Some("")), None);
        assert_eq!(parse_whole_number(None), None);
        assert_eq!(parse_whole_number(Some("9223372036854775807")), None);
    }

    #[test]
    fn implausible_price_and_mileage_are_missing() {
        assert_eq!(parse_price(Some("9223372036854775807")), None);
        assert_eq!(parse_price(Some("$12")), None);
        assert_eq!(parse_price(Some("$600,000")), None);
        assert_eq!(parse_price(Some("$500,000")), Some(500_000));
        assert_eq!(parse_mileage(Some("-5")), None);
        assert_eq!(parse_mileage(Some("900,000 miles")), None);
        assert_eq!(parse_mileage(Some("0")), Some(0));
        assert_eq!(parse_mileage(Some("120k")), Some(120_000));
    }

    #[test]
    fn year_is_extracted_from_text() {
        assert_eq!(parse_year(Some("2010")), Some(2010));
        assert_eq!(parse_year(Some("Model year 2011")), Some(2011));
        assert_eq!(parse_year(Some("n/a")), None);
    }

    #[test]
    fn transmission_vocabulary() {
        assert_eq!(normalize_transmission(Some("7-speed PDK")), Some(Transmission::Automatic));
        assert_eq!(normalize_transmission(Some("Tiptronic S")), Some(Transmission::Automatic));
        assert_eq!(normalize_transmission(Some("6-Speed Manual")), Some(Transmission::Manual));
        assert_eq!(normalize_transmission(Some("CVT?")), None);
        assert_eq!(normalize_transmission(None), None);
    }

    #[test]
    fn colors_bucket_by_family() {
        assert_eq!(color_bucket(Some("Arctic Silver Metallic")), Some(ColorBucket::Monochrome));
        assert_eq!(color_bucket(Some("Basalt Black")), Some(ColorBucket::Monochrome));
        assert_eq!(color_bucket(Some("Guards Red")), Some(ColorBucket::Color));
        assert_eq!(color_bucket(Some("  ")), None);
    }

    #[test]
    fn display_name_skips_base_and_blanks() {
        assert_eq!(model_trim_display(Some(2010), Some("Cayman"), Some("Base")), "2010 Cayman");
        assert_eq!(model_trim_display(Some(2011), Some("Cayman"), Some("R")), "2011 Cayman R");
        assert_eq!(model_trim_display(None, Some("Boxster"), None), "Boxster");
    }

    #[test]
    fn missing_mileage_uses_neutral_band() {
        let settings = settings();
        let raw = RawListing::new("cars.com", "https://cars.com/1");
        let listing = Normalizer::new(&settings).normalize(&raw);
        assert_eq!(listing.mileage, None);
        assert_eq!(listing.mileage_band, MileageBand::NEUTRAL);
        assert!(listing.detected_options.is_empty());
        assert_eq!(listing.options_total_usd, 0);
    }

    #[test]
    fn trim_is_read_from_model_text_when_missing() {
        let settings = settings();
        let mut raw = RawListing::new("cars.com", "https://cars.com/2");
        raw.year = Some("2011".into());
        raw.model = Some("Porsche Cayman R".into());
        raw.mileage = Some("abc".into());
        raw.raw_options = Some("LSD, PASM".into());
        let listing = Normalizer::new(&settings).normalize(&raw);
        assert_eq!(listing.model.as_deref(), Some("Cayman"));
        assert_eq!(listing.trim.as_deref(), Some("R"));
        assert_eq!(listing.mileage, None);
        assert_eq!(listing.model_trim_display, "2011 Cayman R");
        // LSD is standard on the R.
        assert_eq!(listing.options_total_usd, 800);
    }
}
