use std::cmp::Ordering;

use crate::model::{RankedRow, Transmission, ValuedListing};

fn transmission_group(t: Option<Transmission>) -> u8 {
    match t {
        Some(Transmission::Automatic) => 0,
        Some(Transmission::Manual) => 1,
        None => 2,
    }
}

// Larger first, missing last.
fn descending(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// Smaller first, missing last.
fn ascending(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn compare(a: &ValuedListing, b: &ValuedListing) -> Ordering {
    transmission_group(a.listing.transmission)
        .cmp(&transmission_group(b.listing.transmission))
        .then_with(|| descending(a.valuation.primary_metric(), b.valuation.primary_metric()))
        .then_with(|| ascending(a.listing.asking_price_usd, b.listing.asking_price_usd))
}

/// Automatic before Manual, best metric first, cheapest on ties.
/// The sort is stable: equal rows keep their input order.
pub fn rank(mut listings: Vec<ValuedListing>) -> Vec<ValuedListing> {
    listings.sort_by(compare);
    listings
}

/// Output rows with 1-based ranks.
pub fn to_rows(ranked: &[ValuedListing]) -> Vec<RankedRow> {
    ranked
        .iter()
        .enumerate()
        .map(|(i, valued)| RankedRow::from_valued(i + 1, valued))
        .collect()
}
