use tracing::info;

use crate::analyzer::ranking::{rank, to_rows};
use crate::analyzer::{deduplicate, engine_for};
use crate::config::{PricingMode, Settings};
use crate::model::{RankedRow, RawListing};
use crate::normalizer::normalize_all;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub input: usize,
    pub failed: usize,
    pub valued: usize,
    pub duplicates: usize,
    pub ranked: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: String,
    pub mode: PricingMode,
    pub ranked: Vec<RankedRow>,
    /// Rows the scraper marked failed, untouched.
    pub failed: Vec<RawListing>,
    pub stats: RunStats,
}

/// Normalize, value, deduplicate and rank one batch of scraped rows.
pub fn run(settings: &Settings, raws: Vec<RawListing>, run_id: &str) -> RunOutput {
    let input = raws.len();
    let (failed, usable): (Vec<RawListing>, Vec<RawListing>) =
        raws.into_iter().partition(RawListing::is_failed);
    info!("Run {run_id}: {input} rows, {} marked failed", failed.len());

    let normalized = normalize_all(&usable, settings);

    let engine = engine_for(settings);
    info!("Pricing mode: {}", engine.mode().as_str());
    let valued = engine.value_all(normalized);
    let valued_count = valued.len();

    let outcome = deduplicate(valued);
    info!(
        "Dedup kept {} of {} rows ({} duplicates)",
        outcome.retained.len(),
        valued_count,
        outcome.collapsed
    );

    let ranked = to_rows(&rank(outcome.retained));
    info!("Ranked {} listings", ranked.len());

    RunOutput {
        run_id: run_id.to_string(),
        mode: engine.mode(),
        stats: RunStats {
            input,
            failed: failed.len(),
            valued: valued_count,
            duplicates: outcome.collapsed,
            ranked: ranked.len(),
        },
        ranked,
        failed,
    }
}
