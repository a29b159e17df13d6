use std::collections::HashMap;

use crate::model::{NormalizedListing, ValuedListing};
use crate::utils::non_blank;

/// Identity of a physical vehicle across scraped rows.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Vin(String),
    MileageUrl {
        mileage: Option<u32>,
        listing_url: String,
    },
}

/// Anything that can be grouped by vehicle identity.
pub trait DedupRecord {
    fn dedup_key(&self) -> DedupKey;
    fn filled_field_count(&self) -> usize;
}

impl DedupRecord for NormalizedListing {
    fn dedup_key(&self) -> DedupKey {
        match non_blank(self.raw.vin.as_deref()) {
            Some(vin) => DedupKey::Vin(vin.to_string()),
            None => DedupKey::MileageUrl {
                mileage: self.mileage,
                listing_url: self.raw.listing_url.clone(),
            },
        }
    }

    fn filled_field_count(&self) -> usize {
        self.raw.filled_field_count()
    }
}

impl DedupRecord for ValuedListing {
    fn dedup_key(&self) -> DedupKey {
        self.listing.dedup_key()
    }

    fn filled_field_count(&self) -> usize {
        self.listing.filled_field_count()
    }
}

/// Outcome of the deduplication pass.
#[derive(Clone, Debug)]
pub struct DedupOutcome<T> {
    pub retained: Vec<T>,
    /// Rows dropped in favour of a more complete duplicate.
    pub collapsed: usize,
}

/// Keeps one row per vehicle: the most complete one, earliest on ties.
/// Survivors stay in input order. Rows are selected, never merged.
pub fn deduplicate<T: DedupRecord>(records: Vec<T>) -> DedupOutcome<T> {
    let total = records.len();
    let mut group_of: HashMap<DedupKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let group = *group_of.entry(record.dedup_key()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(idx);
    }

    let mut winners: Vec<usize> = groups
        .iter()
        .filter_map(|members| {
            members.iter().copied().reduce(|best, idx| {
                if records[idx].filled_field_count() > records[best].filled_field_count() {
                    idx
                } else {
                    best
                }
            })
        })
        .collect();
    winners.sort_unstable();

    let mut keep = vec![false; total];
    for idx in &winners {
        keep[*idx] = true;
    }
    let retained: Vec<T> = records
        .into_iter()
        .zip(keep)
        .filter_map(|(record, keep)| keep.then_some(record))
        .collect();

    DedupOutcome {
        collapsed: total - retained.len(),
        retained,
    }
}
