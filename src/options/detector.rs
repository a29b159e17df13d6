use std::sync::Arc;

use crate::model::DetectedOption;
use crate::options::catalog::Catalog;

/// Matches catalog options against a listing's free-text option blob.
pub struct OptionsDetector {
    catalog: Arc<Catalog>,
}

impl OptionsDetector {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Every option whose patterns match `text`, at most once each.
    ///
    /// Options that are standard on `trim` are still returned, flagged as
    /// suppressed. Result is ordered by credited value (descending), then
    /// display name, so the outcome does not depend on catalog order.
    pub fn detect(&self, text: &str, trim: Option<&str>) -> Vec<DetectedOption> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut detected: Vec<DetectedOption> = self
            .catalog
            .matching(text)
            .map(|definition| DetectedOption {
                is_standard_suppressed: trim.is_some_and(|t| definition.is_standard_on(t)),
                definition: Arc::clone(definition),
            })
            .collect();

        detected.sort_by(|a, b| {
            b.credited_value_usd()
                .cmp(&a.credited_value_usd())
                .then_with(|| {
                    a.definition
                        .display
                        .to_lowercase()
                        .cmp(&b.definition.display.to_lowercase())
                })
                .then_with(|| a.definition.id.cmp(&b.definition.id))
        });
        detected
    }
}
