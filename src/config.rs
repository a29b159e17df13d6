use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{ConfigError, MileageBand};
use crate::options::catalog::{Catalog, OptionDefinition, default_definitions};
use crate::options::pricing::DEFAULT_OPTION_MSRP_USD;
use crate::vehicles::{VehicleCatalog, VehicleMatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    #[default]
    MsrpOnly,
    Current,
}

impl PricingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PricingMode::MsrpOnly => "msrp_only",
            PricingMode::Current => "current",
        }
    }
}

impl FromStr for PricingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "msrp_only" | "msrp" => Ok(PricingMode::MsrpOnly),
            "current" | "fair_value" => Ok(PricingMode::Current),
            other => Err(ConfigError::Invalid(format!("unknown pricing mode {other:?}"))),
        }
    }
}

/// Bonus per mileage band, in dollars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MileageBonuses {
    pub under_40k: i64,
    pub from_40k: i64,
    pub from_60k: i64,
    pub from_80k: i64,
    pub from_100k: i64,
    pub from_120k: i64,
}

impl Default for MileageBonuses {
    fn default() -> Self {
        Self {
            under_40k: 3000,
            from_40k: 1500,
            from_60k: 0,
            from_80k: -4000,
            from_100k: -9000,
            from_120k: -15000,
        }
    }
}

impl MileageBonuses {
    pub fn bonus_for(&self, band: MileageBand) -> i64 {
        match band {
            MileageBand::Under40k => self.under_40k,
            MileageBand::From40k => self.from_40k,
            MileageBand::From60k => self.from_60k,
            MileageBand::From80k => self.from_80k,
            MileageBand::From100k => self.from_100k,
            MileageBand::From120k => self.from_120k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FairValueConfig {
    pub base_value_usd: i64,
    pub base_year: i32,
    pub year_step_usd: i64,
    pub color_bonus_usd: i64,
    pub trim_premiums: BTreeMap<String, i64>,
    pub mileage_bonus_usd: MileageBonuses,
}

impl Default for FairValueConfig {
    fn default() -> Self {
        let trim_premiums = [("S", 7000), ("R", 30000), ("Spyder", 30000), ("Black Edition", 1500)]
            .into_iter()
            .map(|(name, usd)| (name.to_string(), usd))
            .collect();
        Self {
            base_value_usd: 30500,
            base_year: 2009,
            year_step_usd: 500,
            color_bonus_usd: 300,
            trim_premiums,
            mileage_bonus_usd: MileageBonuses::default(),
        }
    }
}

impl FairValueConfig {
    /// Premium for a named trim; unknown and base trims get 0.
    pub fn trim_premium(&self, trim: Option<&str>) -> i64 {
        let Some(trim) = trim.map(str::trim).filter(|t| !t.is_empty()) else {
            return 0;
        };
        self.trim_premiums
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trim))
            .map(|(_, usd)| *usd)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Full replacement for the built-in catalog.
    #[serde(default)]
    pub catalog: Option<Vec<OptionDefinition>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub msrp: BTreeMap<String, i64>,
}

/// model -> generation code -> option MSRP overrides
pub type GenerationOverrides = BTreeMap<String, BTreeMap<String, GenerationOptions>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/results")
}

fn default_sqlite_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/listings.db"))
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pricing_mode: PricingMode,
    pub default_option_msrp_usd: u32,
    pub fair_value: FairValueConfig,
    pub options: OptionsConfig,
    pub options_per_generation: GenerationOverrides,
    pub vehicles: VehicleCatalog,
    pub output: OutputConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pricing_mode: PricingMode::default(),
            default_option_msrp_usd: DEFAULT_OPTION_MSRP_USD as u32,
            fair_value: FairValueConfig::default(),
            options: OptionsConfig::default(),
            options_per_generation: GenerationOverrides::new(),
            vehicles: VehicleCatalog::default(),
            output: OutputConfig::default(),
        }
    }
}

impl AppConfig {
    /// Checks everything that would silently skew the numbers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fv = &self.fair_value;
        if !(1900..=2100).contains(&fv.base_year) {
            return Err(ConfigError::Invalid(format!(
                "fair_value.base_year {} out of range",
                fv.base_year
            )));
        }

        let bonuses: Vec<i64> = MileageBand::ALL
            .iter()
            .map(|band| fv.mileage_bonus_usd.bonus_for(*band))
            .collect();
        if bonuses.windows(2).any(|pair| pair[1] > pair[0]) {
            return Err(ConfigError::Invalid(format!(
                "mileage bonuses must not increase with mileage: {bonuses:?}"
            )));
        }

        for (model, generations) in &self.options_per_generation {
            let Some(entry) = self.vehicles.model(model) else {
                return Err(ConfigError::Invalid(format!(
                    "options_per_generation references unknown model {model}"
                )));
            };
            for code in generations.keys() {
                if !entry.generations.iter().any(|g| &g.code == code) {
                    return Err(ConfigError::Invalid(format!(
                        "options_per_generation references unknown generation {model} {code}"
                    )));
                }
            }
            if let Some((id, usd)) = generations
                .values()
                .flat_map(|g| g.msrp.iter())
                .find(|(_, usd)| **usd < 0)
            {
                return Err(ConfigError::Invalid(format!(
                    "negative MSRP override {usd} for {model} {id}"
                )));
            }
        }
        Ok(())
    }
}

/// Reads the JSON config at `path`. A missing file means every default applies.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No config at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            });
        }
    };
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Validated configuration plus the compiled option catalog, shared read-only.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: AppConfig,
    pub catalog: Arc<Catalog>,
    pub vehicles: Arc<VehicleMatcher>,
}

impl Settings {
    pub fn from_config(config: AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let definitions = config
            .options
            .catalog
            .clone()
            .unwrap_or_else(default_definitions);
        let catalog = Catalog::from_definitions(definitions)?;
        let vehicles = VehicleMatcher::new(&config.vehicles)?;
        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            vehicles: Arc::new(vehicles),
        })
    }

    pub fn pricing_mode(&self) -> PricingMode {
        self.config.pricing_mode
    }
}

pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    Settings::from_config(load_config(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(dir.path().join("nope.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.pricing_mode, PricingMode::MsrpOnly);
        assert_eq!(config.default_option_msrp_usd, 500);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"pricing_mode": "current", "fair_value": {"base_value_usd": 28000}}"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.pricing_mode, PricingMode::Current);
        assert_eq!(config.fair_value.base_value_usd, 28000);
        assert_eq!(config.fair_value.year_step_usd, 500);
        assert_eq!(config.fair_value.trim_premium(Some("s")), 7000);
    }

    #[test]
    fn unparsable_file_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))), "got: {result:?}");
    }

    #[test]
    fn increasing_mileage_bonus_is_rejected() {
        let mut config = AppConfig::default();
        config.fair_value.mileage_bonus_usd.from_100k = 500;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn override_for_unknown_model_is_rejected() {
        let mut config = AppConfig::default();
        config
            .options_per_generation
            .entry("911".into())
            .or_default()
            .insert("997.2".into(), GenerationOptions::default());
        let result = Settings::from_config(config);
        assert!(matches!(result, Err(ConfigError::Invalid(ref m)) if m.contains("911")));
    }

    #[test]
    fn bad_catalog_pattern_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"options": {"catalog": [
                {"id": "LSD", "display": "LSD", "value_usd": 1200,
                 "patterns": ["(lsd"], "category": "performance"}
            ]}}"#,
        )
        .unwrap();
        let result = load_settings(&path);
        assert!(matches!(result, Err(ConfigError::Pattern { .. })), "got: {result:?}");
    }

    #[test]
    fn pricing_mode_parses_from_cli_text() {
        assert_eq!("current".parse::<PricingMode>().unwrap(), PricingMode::Current);
        assert_eq!("MSRP_ONLY".parse::<PricingMode>().unwrap(), PricingMode::MsrpOnly);
        assert!("cheap".parse::<PricingMode>().is_err());
    }

    #[test]
    fn unknown_trim_has_no_premium() {
        let fv = FairValueConfig::default();
        assert_eq!(fv.trim_premium(Some("Base")), 0);
        assert_eq!(fv.trim_premium(None), 0);
        assert_eq!(fv.trim_premium(Some("black edition")), 1500);
    }
}
