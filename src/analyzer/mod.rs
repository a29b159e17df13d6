// Analyzer module: valuation, deduplication and ranking stages.

pub mod dedup;
pub mod ranking;
pub mod valuation;

pub use dedup::{DedupOutcome, DedupRecord, deduplicate};
pub use valuation::{FairValueEngine, MsrpTotalEngine, Valuator, engine_for};
