//! Model / generation / trim catalog.
//!
//! Used to resolve a listing's generation code (for per-generation MSRP
//! overrides) and to pick canonical model and trim names out of page text.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::model::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimEntry {
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationEntry {
    pub code: String,
    #[serde(default)]
    pub min_year: Option<i32>,
    #[serde(default)]
    pub max_year: Option<i32>,
    #[serde(default)]
    pub trims: Vec<TrimEntry>,
}

impl GenerationEntry {
    pub fn covers(&self, year: i32) -> bool {
        self.min_year.is_none_or(|min| year >= min) && self.max_year.is_none_or(|max| year <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub generations: Vec<GenerationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleCatalog {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

impl Default for VehicleCatalog {
    fn default() -> Self {
        let trim = |name: &str, synonyms: &[&str]| TrimEntry {
            name: name.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        };
        let model = |name: &str, trims: Vec<TrimEntry>| ModelEntry {
            name: name.to_string(),
            synonyms: vec![name.to_string(), format!("Porsche {name}")],
            generations: vec![GenerationEntry {
                code: "987.2".to_string(),
                min_year: Some(2009),
                max_year: Some(2012),
                trims,
            }],
        };

        Self {
            models: vec![
                model(
                    "Cayman",
                    vec![
                        trim("R", &["Cayman R"]),
                        trim("Black Edition", &["Cayman S Black Edition", "Black Edition"]),
                        trim("S", &["Cayman S"]),
                        trim("Base", &["Cayman Base", "Base Cayman"]),
                    ],
                ),
                model(
                    "Boxster",
                    vec![
                        trim("Spyder", &["Boxster Spyder", "Spyder"]),
                        trim("Black Edition", &["Boxster S Black Edition", "Black Edition"]),
                        trim("S", &["Boxster S"]),
                        trim("Base", &["Boxster Base", "Base Boxster"]),
                    ],
                ),
            ],
        }
    }
}

impl VehicleCatalog {
    pub fn model(&self, name: &str) -> Option<&ModelEntry> {
        let name = name.trim();
        self.models.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Generation code covering `year` for `model`, if the catalog knows it.
    pub fn generation_code(&self, model: &str, year: i32) -> Option<&str> {
        self.model(model)?
            .generations
            .iter()
            .find(|g| g.covers(year))
            .map(|g| g.code.as_str())
    }
}

/// Compiled synonym patterns for a [`VehicleCatalog`], built once per run.
#[derive(Debug, Clone)]
pub struct VehicleMatcher {
    models: Vec<CompiledModel>,
}

#[derive(Debug, Clone)]
struct CompiledModel {
    name: String,
    pattern: Option<Regex>,
    generations: Vec<CompiledGeneration>,
    // Every trim term of every generation, for rows without a usable year.
    all_terms: Vec<TrimTerm>,
}

#[derive(Debug, Clone)]
struct CompiledGeneration {
    min_year: Option<i32>,
    max_year: Option<i32>,
    terms: Vec<TrimTerm>,
}

#[derive(Debug, Clone)]
struct TrimTerm {
    trim: String,
    pattern: Regex,
}

impl CompiledGeneration {
    fn covers(&self, year: i32) -> bool {
        self.min_year.is_none_or(|min| year >= min) && self.max_year.is_none_or(|max| year <= max)
    }
}

impl VehicleMatcher {
    pub fn new(catalog: &VehicleCatalog) -> Result<Self, ConfigError> {
        let models = catalog
            .models
            .iter()
            .map(|model| -> Result<CompiledModel, ConfigError> {
                let generations = model
                    .generations
                    .iter()
                    .map(|g| -> Result<CompiledGeneration, ConfigError> {
                        Ok(CompiledGeneration {
                            min_year: g.min_year,
                            max_year: g.max_year,
                            terms: trim_terms(g.trims.iter())?,
                        })
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Ok(CompiledModel {
                    name: model.name.clone(),
                    pattern: word_pattern(model.synonyms.iter().chain([&model.name]))?,
                    all_terms: trim_terms(model.generations.iter().flat_map(|g| g.trims.iter()))?,
                    generations,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { models })
    }

    /// Canonical (model, trim) names found in `text`.
    ///
    /// Longer synonyms are tried first so "Cayman S Black Edition" is not
    /// read as plain "Cayman S". Single-letter trim names only match through
    /// their synonyms.
    pub fn detect_model_and_trim(
        &self,
        text: &str,
        year: Option<i32>,
    ) -> (Option<String>, Option<String>) {
        let Some(model) = self
            .models
            .iter()
            .find(|m| m.pattern.as_ref().is_some_and(|re| re.is_match(text)))
        else {
            return (None, None);
        };

        let terms = year
            .and_then(|y| model.generations.iter().find(|g| g.covers(y)))
            .map(|g| &g.terms)
            .filter(|terms| !terms.is_empty())
            .unwrap_or(&model.all_terms);

        let trim = terms
            .iter()
            .find(|t| t.pattern.is_match(text))
            .map(|t| t.trim.clone());

        (Some(model.name.clone()), trim)
    }
}

fn trim_terms<'t>(
    trims: impl Iterator<Item = &'t TrimEntry>,
) -> Result<Vec<TrimTerm>, ConfigError> {
    let mut terms: Vec<(&str, &str)> = trims
        .flat_map(|t| {
            let own = (t.name.chars().count() > 1).then_some(t.name.as_str());
            t.synonyms
                .iter()
                .map(String::as_str)
                .chain(own)
                .map(move |s| (t.name.as_str(), s))
        })
        .collect();
    terms.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut compiled = Vec::with_capacity(terms.len());
    for (trim, term) in terms {
        if let Some(pattern) = word_pattern([term])? {
            compiled.push(TrimTerm {
                trim: trim.to_string(),
                pattern,
            });
        }
    }
    Ok(compiled)
}

/// Case-insensitive whole-word alternation of `terms`; `None` when every term is blank.
fn word_pattern<I, S>(terms: I) -> Result<Option<Regex>, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let escaped: Vec<String> = terms
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| regex::escape(&t).replace("\\ ", r"\s+").replace(' ', r"\s+"))
        .collect();
    if escaped.is_empty() {
        return Ok(None);
    }
    let pattern = format!(r"\b(?:{})\b", escaped.join("|"));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|source| ConfigError::Synonym { pattern, source })
}
