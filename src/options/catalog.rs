use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use regex::{RegexBuilder, RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

use crate::model::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionCategory {
    Performance,
    Seating,
    Technology,
    Exterior,
    Convenience,
    Transmission,
}

impl fmt::Display for OptionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionCategory::Performance => "performance",
            OptionCategory::Seating => "seating",
            OptionCategory::Technology => "technology",
            OptionCategory::Exterior => "exterior",
            OptionCategory::Convenience => "convenience",
            OptionCategory::Transmission => "transmission",
        };
        f.write_str(name)
    }
}

/// A factory option the detector can credit.
///
/// `value_usd` is the fair-value contribution; `msrp_usd` is the catalog's
/// stored MSRP used when no per-generation override exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDefinition {
    pub id: String,
    pub display: String,
    pub value_usd: i64,
    #[serde(default)]
    pub msrp_usd: Option<i64>,
    pub patterns: Vec<String>,
    pub category: OptionCategory,
    #[serde(default)]
    pub standard_on: Vec<String>,
}

impl OptionDefinition {
    pub fn is_standard_on(&self, trim: &str) -> bool {
        let trim = trim.trim();
        !trim.is_empty() && self.standard_on.iter().any(|t| t.trim().eq_ignore_ascii_case(trim))
    }
}

#[derive(Debug)]
struct CatalogEntry {
    definition: Arc<OptionDefinition>,
    matcher: RegexSet,
}

/// The compiled, immutable option table for one run.
#[derive(Debug)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Compiles and validates a list of definitions. Any malformed entry
    /// rejects the whole catalog.
    pub fn from_definitions(definitions: Vec<OptionDefinition>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(definitions.len());

        for def in definitions {
            if def.id.trim().is_empty() {
                return Err(ConfigError::Invalid("option with empty id".into()));
            }
            if def.display.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("option {}: empty display", def.id)));
            }
            if !seen.insert(def.id.to_lowercase()) {
                return Err(ConfigError::Invalid(format!("duplicate option id {}", def.id)));
            }
            if def.patterns.is_empty() {
                return Err(ConfigError::Invalid(format!("option {}: no patterns", def.id)));
            }
            if def.value_usd < 0 || def.msrp_usd.is_some_and(|m| m < 0) {
                return Err(ConfigError::Invalid(format!(
                    "option {}: negative dollar amount",
                    def.id
                )));
            }
            // Compile one by one first so the error names the bad pattern.
            for pattern in &def.patterns {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::Pattern {
                        option_id: def.id.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
            }
            let matcher = RegexSetBuilder::new(&def.patterns)
                .case_insensitive(true)
                .build()
                .map_err(|source| ConfigError::Pattern {
                    option_id: def.id.clone(),
                    pattern: def.patterns.join(" | "),
                    source,
                })?;
            entries.push(CatalogEntry {
                definition: Arc::new(def),
                matcher,
            });
        }

        Ok(Self { entries })
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_definitions(default_definitions())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive lookup by option id.
    pub fn get(&self, id: &str) -> Option<&Arc<OptionDefinition>> {
        let id = id.trim();
        self.entries
            .iter()
            .map(|e| &e.definition)
            .find(|d| d.id.eq_ignore_ascii_case(id))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<OptionDefinition>> {
        self.entries.iter().map(|e| &e.definition)
    }

    /// Definitions with at least one pattern matching `text`.
    pub(crate) fn matching<'a>(
        &'a self,
        text: &'a str,
    ) -> impl Iterator<Item = &'a Arc<OptionDefinition>> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.matcher.is_match(text))
            .map(|e| &e.definition)
    }
}

struct Seed {
    id: &'static str,
    display: &'static str,
    value_usd: i64,
    msrp_usd: Option<i64>,
    category: OptionCategory,
    patterns: &'static [&'static str],
    standard_on: &'static [&'static str],
}

use OptionCategory::*;

// Built-in table, used when the configuration does not supply a catalog.
const DEFAULT_OPTIONS: &[Seed] = &[
    Seed {
        id: "639/640",
        display: "Sport Chrono Package Plus",
        value_usd: 1000,
        msrp_usd: Some(960),
        category: Performance,
        patterns: &[
            r"\bsport\s+chrono\b",
            r"\bchrono\s+(?:package|plus)\b",
            r"\bchrono\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "PASM",
        display: "PASM",
        value_usd: 800,
        msrp_usd: Some(1990),
        category: Performance,
        patterns: &[
            r"\bpasm\b",
            r"\bporsche\s+active\s+suspension\s+management\b",
            r"\badaptive\s+(?:sport\s+)?suspension\b",
            r"\bactive\s+suspension\b",
            r"\badaptive\s+damping\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "LSD",
        display: "Limited Slip Differential (LSD)",
        value_usd: 1200,
        msrp_usd: Some(1200),
        category: Performance,
        patterns: &[
            r"\blsd\b",
            r"\blimited[-\s]+slip\b",
            r"\blocking\s+diff(?:erential)?\b",
            r"\bmechanical\s+diff(?:erential)?\b",
        ],
        standard_on: &["R", "Spyder"],
    },
    Seed {
        id: "PSE",
        display: "Sport Exhaust (PSE)",
        value_usd: 800,
        msrp_usd: Some(2590),
        category: Performance,
        patterns: &[
            r"\bpse\b",
            r"\bsport\s+exhaust\b",
            r"\bsports\s+exhaust\b",
            r"\bdual\s+exhaust\b",
            r"\bxlf\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "X51",
        display: "X51 Power Kit",
        value_usd: 0,
        msrp_usd: None,
        category: Performance,
        patterns: &[r"\bx\s*51\b", r"\b(?:engine\s+)?power\s*kit\b"],
        standard_on: &[],
    },
    Seed {
        id: "SHORT_SHIFTER",
        display: "Short Shifter",
        value_usd: 0,
        msrp_usd: Some(650),
        category: Performance,
        patterns: &[r"\bshort\s+shift(?:er)?\b", r"\bx9[78]\b"],
        standard_on: &[],
    },
    Seed {
        id: "Sport Seats",
        display: "Sport Seats / Adaptive Sport Seats",
        value_usd: 500,
        msrp_usd: Some(2420),
        category: Seating,
        patterns: &[
            r"\b(?:adaptive\s+)?sport\s+(?:bucket\s+)?seats\b",
            r"\b(?:adaptive\s+)?sport\s+seating\b",
            r"\bbucket\s+seats\b",
            r"\bq[12]j\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "Heated Seats",
        display: "Heated Seats",
        value_usd: 150,
        msrp_usd: Some(500),
        category: Seating,
        patterns: &[
            r"\bheated\s+(?:front\s+|driver\s+|passenger\s+)?seats?\b",
            r"\bseat\s+heating\b",
            r"\b4a3\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "Ventilated Seats",
        display: "Ventilated Seats",
        value_usd: 150,
        msrp_usd: Some(840),
        category: Seating,
        patterns: &[
            r"\bventilated\s+(?:seats|seating|leather)\b",
            r"\bseat\s+ventilation\b",
            r"\bcooled\s+seats\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "PCM",
        display: "PCM w/ Navigation",
        value_usd: 300,
        msrp_usd: Some(3110),
        category: Technology,
        patterns: &[
            r"\bpcm\b",
            r"\bnavigation\b",
            r"\bnav\s+system\b",
            r"\b(?:premium\s+)?communication\s+(?:module|system)\b",
            r"\bi8t\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "BOSE",
        display: "BOSE Surround Sound",
        value_usd: 300,
        msrp_usd: Some(1390),
        category: Technology,
        patterns: &[
            r"\bbose\b",
            r"\bsurround\s+sound\b",
            r"\bpremium\s+(?:sound|audio)(?:\s+system)?\b",
            r"\bupgraded\s+sound\s+system\b",
            r"\b9vl\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "Bi-Xenon",
        display: "Bi-Xenon Headlights with Dynamic Cornering",
        value_usd: 250,
        msrp_usd: Some(1690),
        category: Exterior,
        patterns: &[
            r"\bbi[-\s]?xenon\b",
            r"\bxenon\s+(?:headlights|lighting)\b",
            r"\b(?:dynamic\s+)?cornering\s+lights\b",
            r"\badaptive\s+(?:headlights|lighting)\b",
            r"\bpdls\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "Wheels",
        display: "18-19\" Upgraded Wheels",
        value_usd: 400,
        msrp_usd: Some(1500),
        category: Exterior,
        patterns: &[
            r"\b1[89]\s*-?\s*inch\b",
            r#"\b1[89]\s*(?:"|in\b|inch(?:es)?\b)\s*(?:alloy\s+)?wheels\b"#,
            r"\b(?:upgraded|premium|sport)\s+wheels\b",
            r"\balloy\s+wheels\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "Park Assist",
        display: "Park Assist",
        value_usd: 200,
        msrp_usd: Some(530),
        category: Convenience,
        patterns: &[
            r"\bpark(?:ing)?\s+assist\b",
            r"\bparking\s+(?:aid|sensors)\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "DIM_RAIN",
        display: "Auto-dim Mirrors & Rain Sensor",
        value_usd: 0,
        msrp_usd: Some(690),
        category: Convenience,
        patterns: &[
            r"\b(?:auto|self)[-\s]?dimm?ing\b",
            r"\brain\s+sensor\b",
        ],
        standard_on: &[],
    },
    Seed {
        id: "PDK",
        display: "PDK",
        value_usd: 0,
        msrp_usd: Some(3420),
        category: Transmission,
        patterns: &[
            r"\bpdk\b",
            r"\bdoppelkupplung\b",
            r"\b7[-\s]?speed\b",
            r"\bdual[-\s]clutch\b",
        ],
        standard_on: &[],
    },
];

/// The built-in option table as owned definitions.
pub fn default_definitions() -> Vec<OptionDefinition> {
    DEFAULT_OPTIONS
        .iter()
        .map(|s| OptionDefinition {
            id: s.id.to_string(),
            display: s.display.to_string(),
            value_usd: s.value_usd,
            msrp_usd: s.msrp_usd,
            patterns: s.patterns.iter().map(|p| p.to_string()).collect(),
            category: s.category,
            standard_on: s.standard_on.iter().map(|t| t.to_string()).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: &str, patterns: &[&str]) -> OptionDefinition {
        OptionDefinition {
            id: id.to_string(),
            display: id.to_string(),
            value_usd: 100,
            msrp_usd: None,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            category: OptionCategory::Performance,
            standard_on: vec![],
        }
    }

    #[test]
    fn builtin_catalog_compiles() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.len(), DEFAULT_OPTIONS.len());
        assert!(catalog.get("lsd").is_some());
        assert!(catalog.get("639/640").is_some());
    }

    #[test]
    fn duplicate_ids_are_rejected_case_insensitively() {
        let err = Catalog::from_definitions(vec![
            definition("PASM", &[r"\bpasm\b"]),
            definition("pasm", &[r"\bdamping\b"]),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn bad_pattern_names_the_option() {
        let err = Catalog::from_definitions(vec![definition("LSD", &["(unclosed"])]).unwrap_err();
        assert!(
            matches!(err, ConfigError::Pattern { ref option_id, .. } if option_id == "LSD"),
            "got {err:?}"
        );
    }

    #[test]
    fn options_without_patterns_are_rejected() {
        let err = Catalog::from_definitions(vec![definition("LSD", &[])]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn standard_on_ignores_case_and_blank_trim() {
        let mut def = definition("LSD", &[r"\blsd\b"]);
        def.standard_on = vec!["R".into()];
        assert!(def.is_standard_on("r"));
        assert!(def.is_standard_on(" R "));
        assert!(!def.is_standard_on("S"));
        assert!(!def.is_standard_on(""));
    }

    #[test]
    fn synonym_family_resolves_to_lsd() {
        let catalog = Catalog::builtin().unwrap();
        for text in ["LSD", "limited-slip", "Limited Slip Differential", "locking diff"] {
            let ids: Vec<_> = catalog.matching(text).map(|d| d.id.as_str()).collect();
            assert_eq!(ids, vec!["LSD"], "text {text:?}");
        }
    }
}
