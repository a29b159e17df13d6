//! Generation catalog for front ends and docs:
//! models -> generations -> years, trims and priced options.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Settings;
use crate::model::StorageError;
use crate::options::pricing::MsrpResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationCatalog {
    pub models: Vec<ModelExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelExport {
    pub name: String,
    pub generations: Vec<GenerationExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSpan {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionExport {
    pub id: String,
    pub display: String,
    pub msrp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationExport {
    pub key: String,
    pub code: String,
    pub years: YearSpan,
    pub trims: Vec<String>,
    pub options: Vec<OptionExport>,
    /// True when no per-generation override exists and the list is the
    /// catalog's own pricing.
    pub options_default: bool,
}

pub fn build_generation_catalog(settings: &Settings) -> GenerationCatalog {
    let resolver = MsrpResolver::from_settings(settings);
    let overrides = &settings.config.options_per_generation;

    let models = settings
        .config
        .vehicles
        .models
        .iter()
        .map(|model| {
            let model_overrides = overrides
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&model.name))
                .map(|(_, generations)| generations);

            let generations = model
                .generations
                .iter()
                .map(|generation| {
                    let msrp = model_overrides
                        .and_then(|g| g.get(&generation.code))
                        .map(|g| &g.msrp)
                        .filter(|m| !m.is_empty());

                    let options: Vec<OptionExport> = match msrp {
                        Some(msrp) => msrp
                            .iter()
                            .map(|(id, usd)| OptionExport {
                                id: id.clone(),
                                display: settings
                                    .catalog
                                    .get(id)
                                    .map_or_else(|| id.clone(), |d| d.display.clone()),
                                msrp: *usd,
                            })
                            .collect(),
                        None => settings
                            .catalog
                            .definitions()
                            .map(|d| OptionExport {
                                id: d.id.clone(),
                                display: d.display.clone(),
                                msrp: resolver
                                    .resolve(&d.id, Some(model.name.as_str()), generation.min_year)
                                    .usd,
                            })
                            .collect(),
                    };

                    GenerationExport {
                        key: format!("{}-{}", model.name, generation.code),
                        code: generation.code.clone(),
                        years: YearSpan {
                            min: generation.min_year,
                            max: generation.max_year,
                        },
                        trims: generation.trims.iter().map(|t| t.name.clone()).collect(),
                        options_default: msrp.is_none(),
                        options,
                    }
                })
                .collect();

            ModelExport {
                name: model.name.clone(),
                generations,
            }
        })
        .collect();

    GenerationCatalog { models }
}

pub fn export_generation_catalog_json(
    settings: &Settings,
    out_path: &Path,
) -> Result<(), StorageError> {
    let catalog = build_generation_catalog(settings);
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(out_path, serde_json::to_string_pretty(&catalog)?)?;
    info!("Exported generation catalog to {}", out_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, GenerationOptions};

    #[test]
    fn default_catalog_lists_catalog_pricing() {
        let settings = Settings::from_config(AppConfig::default()).unwrap();
        let catalog = build_generation_catalog(&settings);
        assert_eq!(catalog.models.len(), 2);

        let cayman = &catalog.models[0].generations[0];
        assert_eq!(cayman.key, "Cayman-987.2");
        assert_eq!(cayman.years.min, Some(2009));
        assert_eq!(cayman.years.max, Some(2012));
        assert!(cayman.trims.contains(&"R".to_string()));
        assert!(cayman.options_default);
        let pasm = cayman.options.iter().find(|o| o.id == "PASM").unwrap();
        assert_eq!(pasm.msrp, 1990);
    }

    #[test]
    fn overrides_replace_option_list() {
        let mut config = AppConfig::default();
        let mut generation = GenerationOptions::default();
        generation.msrp.insert("PASM".into(), 2000);
        generation.msrp.insert("CUSTOM".into(), 750);
        config
            .options_per_generation
            .entry("Boxster".into())
            .or_default()
            .insert("987.2".into(), generation);
        let settings = Settings::from_config(config).unwrap();

        let catalog = build_generation_catalog(&settings);
        let boxster = &catalog.models[1].generations[0];
        assert!(!boxster.options_default);
        let priced: Vec<(&str, i64)> = boxster
            .options
            .iter()
            .map(|o| (o.id.as_str(), o.msrp))
            .collect();
        assert_eq!(priced, vec![("CUSTOM", 750), ("PASM", 2000)]);
        assert_eq!(boxster.options[0].display, "CUSTOM");
    }

    #[test]
    fn export_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/generation_catalog.json");
        let settings = Settings::from_config(AppConfig::default()).unwrap();
        export_generation_catalog_json(&settings, &path).unwrap();
        let parsed: GenerationCatalog =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, build_generation_catalog(&settings));
    }
}
