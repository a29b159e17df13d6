use crate::config::{FairValueConfig, PricingMode, Settings};
use crate::model::{ColorBucket, NormalizedListing, Valuation, ValuedListing};
use crate::options::pricing::{MsrpResolver, total_options_msrp};

/// Trait defining the interface for a valuation engine.
pub trait Valuator {
    fn mode(&self) -> PricingMode;
    fn value(&self, listing: NormalizedListing) -> ValuedListing;

    fn value_all(&self, listings: Vec<NormalizedListing>) -> Vec<ValuedListing> {
        listings.into_iter().map(|l| self.value(l)).collect()
    }
}

/// The engine selected by the configured pricing mode.
pub fn engine_for(settings: &Settings) -> Box<dyn Valuator + '_> {
    match settings.pricing_mode() {
        PricingMode::Current => Box::new(FairValueEngine::new(&settings.config.fair_value)),
        PricingMode::MsrpOnly => {
            Box::new(MsrpTotalEngine::new(MsrpResolver::from_settings(settings)))
        }
    }
}

/// Every term of the fair-value sum, kept apart for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FairValueBreakdown {
    pub base_value: i64,
    pub trim_premium: i64,
    pub year_adjustment: i64,
    pub mileage_bonus: i64,
    pub exterior_color_bonus: i64,
    pub interior_color_bonus: i64,
    pub options_total: i64,
}

impl FairValueBreakdown {
    /// Saturates instead of overflowing on extreme configured constants.
    pub fn total(&self) -> i64 {
        [
            self.trim_premium,
            self.year_adjustment,
            self.mileage_bonus,
            self.exterior_color_bonus,
            self.interior_color_bonus,
            self.options_total,
        ]
        .into_iter()
        .fold(self.base_value, i64::saturating_add)
    }
}

pub struct FairValueEngine<'a> {
    config: &'a FairValueConfig,
}

impl<'a> FairValueEngine<'a> {
    pub fn new(config: &'a FairValueConfig) -> Self {
        Self { config }
    }

    pub fn breakdown(&self, listing: &NormalizedListing) -> FairValueBreakdown {
        let cfg = self.config;
        let color_bonus = |bucket: Option<ColorBucket>| match bucket {
            Some(ColorBucket::Color) => cfg.color_bonus_usd,
            _ => 0,
        };
        FairValueBreakdown {
            base_value: cfg.base_value_usd,
            trim_premium: cfg.trim_premium(listing.trim.as_deref()),
            year_adjustment: listing.year.map_or(0, |y| {
                cfg.year_step_usd
                    .saturating_mul(i64::from(y) - i64::from(cfg.base_year))
            }),
            mileage_bonus: cfg.mileage_bonus_usd.bonus_for(listing.mileage_band),
            exterior_color_bonus: color_bonus(listing.exterior_bucket),
            interior_color_bonus: color_bonus(listing.interior_bucket),
            options_total: listing.options_total_usd,
        }
    }
}

impl Valuator for FairValueEngine<'_> {
    fn mode(&self) -> PricingMode {
        PricingMode::Current
    }

    fn value(&self, listing: NormalizedListing) -> ValuedListing {
        let fair_value_usd = self.breakdown(&listing).total();
        let deal_delta_usd = listing
            .asking_price_usd
            .and_then(|price| fair_value_usd.checked_sub(price));
        ValuedListing {
            listing,
            valuation: Valuation::FairValue {
                fair_value_usd,
                deal_delta_usd,
            },
        }
    }
}

pub struct MsrpTotalEngine<'a> {
    resolver: MsrpResolver<'a>,
}

impl<'a> MsrpTotalEngine<'a> {
    pub fn new(resolver: MsrpResolver<'a>) -> Self {
        Self { resolver }
    }
}

impl Valuator for MsrpTotalEngine<'_> {
    fn mode(&self) -> PricingMode {
        PricingMode::MsrpOnly
    }

    fn value(&self, listing: NormalizedListing) -> ValuedListing {
        let total_options_msrp = total_options_msrp(
            &listing.detected_options,
            &self.resolver,
            listing.model.as_deref(),
            listing.year,
        );
        ValuedListing {
            listing,
            valuation: Valuation::MsrpTotal { total_options_msrp },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model::{MileageBand, RawListing};
    use crate::normalizer::Normalizer;

    fn settings(mode: PricingMode) -> Settings {
        let config = AppConfig {
            pricing_mode: mode,
            ..AppConfig::default()
        };
        Settings::from_config(config).unwrap()
    }

    fn raw() -> RawListing {
        let mut raw = RawListing::new("cars.com", "https://cars.com/9");
        raw.year = Some("2011".into());
        raw.model = Some("Cayman".into());
        raw.trim = Some("S".into());
        raw.mileage = Some("45,000".into());
        raw.price_usd = Some("$40,000".into());
        raw.exterior_color = Some("Aqua Blue".into());
        raw.interior_color = Some("Black".into());
        raw.raw_options = Some("PASM, Sport Chrono".into());
        raw
    }

    #[test]
    fn fair_value_adds_every_term() {
        let settings = settings(PricingMode::Current);
        let listing = Normalizer::new(&settings).normalize(&raw());
        let engine = FairValueEngine::new(&settings.config.fair_value);

        let b = engine.breakdown(&listing);
        assert_eq!(b.base_value, 30500);
        assert_eq!(b.trim_premium, 7000);
        assert_eq!(b.year_adjustment, 1000);
        assert_eq!(b.mileage_bonus, 1500);
        assert_eq!(b.exterior_color_bonus, 300);
        assert_eq!(b.interior_color_bonus, 0);
        assert_eq!(b.options_total, 1800);
        assert_eq!(b.total(), 42100);

        let valued = engine.value(listing);
        assert_eq!(
            valued.valuation,
            Valuation::FairValue {
                fair_value_usd: 42100,
                deal_delta_usd: Some(2100),
            }
        );
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        let mut config = AppConfig::default();
        config.fair_value.base_value_usd = i64::MAX - 10;
        config.fair_value.color_bonus_usd = 1000;
        let settings = Settings::from_config(config).unwrap();
        let engine = FairValueEngine::new(&settings.config.fair_value);

        let mut listing = Normalizer::new(&settings).normalize(&raw());
        assert_eq!(engine.breakdown(&listing).total(), i64::MAX);

        listing.asking_price_usd = Some(i64::MIN);
        let valued = engine.value(listing);
        assert!(matches!(
            valued.valuation,
            Valuation::FairValue { deal_delta_usd: None, .. }
        ));
    }

    #[test]
    fn missing_price_gives_no_delta() {
        let settings = settings(PricingMode::Current);
        let mut raw = raw();
        raw.price_usd = None;
        let listing = Normalizer::new(&settings).normalize(&raw);
        let valued = engine_for(&settings).value(listing);
        assert!(matches!(
            valued.valuation,
            Valuation::FairValue { deal_delta_usd: None, .. }
        ));
    }

    #[test]
    fn mileage_bonus_never_rises_with_mileage() {
        let settings = settings(PricingMode::Current);
        let engine = FairValueEngine::new(&settings.config.fair_value);
        let normalizer = Normalizer::new(&settings);

        let values: Vec<i64> = [10_000, 45_000, 65_000, 85_000, 105_000, 150_000]
            .iter()
            .map(|miles| {
                let mut raw = raw();
                raw.mileage = Some(miles.to_string());
                engine.breakdown(&normalizer.normalize(&raw)).mileage_bonus
            })
            .collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]), "got: {values:?}");
        assert_eq!(
            settings.config.fair_value.mileage_bonus_usd.bonus_for(MileageBand::NEUTRAL),
            0
        );
    }

    #[test]
    fn msrp_mode_sums_resolved_msrp_only() {
        let settings = settings(PricingMode::MsrpOnly);
        let listing = Normalizer::new(&settings).normalize(&raw());
        let engine = engine_for(&settings);
        assert_eq!(engine.mode(), PricingMode::MsrpOnly);

        let valued = engine.value(listing);
        // PASM 1990 + Sport Chrono 960 from the built-in catalog.
        assert_eq!(
            valued.valuation,
            Valuation::MsrpTotal {
                total_options_msrp: 2950
            }
        );
        assert_eq!(valued.valuation.primary_metric(), Some(2950));
    }
}
