use tracing::debug;

use crate::config::{GenerationOverrides, Settings};
use crate::model::DetectedOption;
use crate::options::catalog::Catalog;
use crate::vehicles::VehicleCatalog;

/// Placeholder MSRP for an option nobody has priced.
pub const DEFAULT_OPTION_MSRP_USD: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsrpSource {
    GenerationOverride,
    Catalog,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsrpQuote {
    pub usd: i64,
    pub source: MsrpSource,
}

/// Ordered MSRP lookup: generation override, then catalog, then default.
pub struct MsrpResolver<'a> {
    overrides: &'a GenerationOverrides,
    catalog: &'a Catalog,
    vehicles: &'a VehicleCatalog,
    default_usd: i64,
}

impl<'a> MsrpResolver<'a> {
    pub fn new(
        overrides: &'a GenerationOverrides,
        catalog: &'a Catalog,
        vehicles: &'a VehicleCatalog,
        default_usd: i64,
    ) -> Self {
        Self {
            overrides,
            catalog,
            vehicles,
            default_usd,
        }
    }

    pub fn from_settings(settings: &'a Settings) -> Self {
        Self::new(
            &settings.config.options_per_generation,
            &settings.catalog,
            &settings.config.vehicles,
            i64::from(settings.config.default_option_msrp_usd),
        )
    }

    pub fn resolve(&self, option_id: &str, model: Option<&str>, year: Option<i32>) -> MsrpQuote {
        if let Some(usd) = self.generation_override(option_id, model, year) {
            return MsrpQuote {
                usd,
                source: MsrpSource::GenerationOverride,
            };
        }
        if let Some(usd) = self.catalog.get(option_id).and_then(|d| d.msrp_usd) {
            return MsrpQuote {
                usd,
                source: MsrpSource::Catalog,
            };
        }
        debug!("No MSRP for option {option_id}, using default {}", self.default_usd);
        MsrpQuote {
            usd: self.default_usd,
            source: MsrpSource::Default,
        }
    }

    fn generation_override(
        &self,
        option_id: &str,
        model: Option<&str>,
        year: Option<i32>,
    ) -> Option<i64> {
        let model = model?.trim();
        let code = self.vehicles.generation_code(model, year?)?;
        let generations = self
            .overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(model))
            .map(|(_, generations)| generations)?;
        let option_id = option_id.trim();
        generations
            .get(code)?
            .msrp
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(option_id))
            .map(|(_, usd)| *usd)
    }
}

/// Sum of credited values; suppressed options add nothing.
pub fn options_total_usd(detected: &[DetectedOption]) -> i64 {
    detected.iter().map(DetectedOption::credited_value_usd).sum()
}

/// Sum of resolved MSRPs for the detected options that are not standard.
pub fn total_options_msrp(
    detected: &[DetectedOption],
    resolver: &MsrpResolver<'_>,
    model: Option<&str>,
    year: Option<i32>,
) -> i64 {
    detected
        .iter()
        .filter(|d| !d.is_standard_suppressed)
        .map(|d| resolver.resolve(&d.definition.id, model, year).usd)
        .sum()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::config::GenerationOptions;
    use crate::options::OptionsDetector;

    fn overrides() -> GenerationOverrides {
        let mut msrp = BTreeMap::new();
        msrp.insert("pasm".to_string(), 2100);
        let mut generations = BTreeMap::new();
        generations.insert("987.2".to_string(), GenerationOptions { msrp });
        let mut models = BTreeMap::new();
        models.insert("Cayman".to_string(), generations);
        models
    }

    #[test]
    fn override_wins_for_matching_generation() {
        let catalog = Catalog::builtin().unwrap();
        let vehicles = VehicleCatalog::default();
        let overrides = overrides();
        let resolver = MsrpResolver::new(&overrides, &catalog, &vehicles, 500);

        let quote = resolver.resolve("PASM", Some("cayman"), Some(2010));
        assert_eq!(quote.usd, 2100);
        assert_eq!(quote.source, MsrpSource::GenerationOverride);

        // Outside the generation's years the catalog value applies.
        let quote = resolver.resolve("PASM", Some("Cayman"), Some(2006));
        assert_eq!(quote.usd, 1990);
        assert_eq!(quote.source, MsrpSource::Catalog);

        let quote = resolver.resolve("PASM", None, Some(2010));
        assert_eq!(quote.source, MsrpSource::Catalog);
    }

    #[test]
    fn unknown_option_gets_default_not_zero() {
        let catalog = Catalog::builtin().unwrap();
        let vehicles = VehicleCatalog::default();
        let overrides = overrides();
        let resolver = MsrpResolver::new(&overrides, &catalog, &vehicles, DEFAULT_OPTION_MSRP_USD);

        let quote = resolver.resolve("CERAMIC_BRAKES", Some("Cayman"), Some(2010));
        assert_eq!(quote.usd, 500);
        assert_eq!(quote.source, MsrpSource::Default);

        // Catalog entry without a stored MSRP also falls through.
        let quote = resolver.resolve("X51", Some("Cayman"), Some(2010));
        assert_eq!(quote.source, MsrpSource::Default);
    }

    #[test]
    fn totals_skip_suppressed_options() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let vehicles = VehicleCatalog::default();
        let overrides = GenerationOverrides::new();
        let resolver = MsrpResolver::new(&overrides, &catalog, &vehicles, 500);
        let detector = OptionsDetector::new(Arc::clone(&catalog));

        let detected = detector.detect("PASM and a limited slip diff", Some("R"));
        assert_eq!(options_total_usd(&detected), 800);
        assert_eq!(total_options_msrp(&detected, &resolver, Some("Cayman"), Some(2011)), 1990);

        let detected = detector.detect("PASM and a limited slip diff", Some("S"));
        assert_eq!(options_total_usd(&detected), 2000);
        assert_eq!(total_options_msrp(&detected, &resolver, Some("Cayman"), Some(2011)), 3190);
    }
}
