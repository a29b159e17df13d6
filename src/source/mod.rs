pub mod csv_source;
pub mod snapshot;
pub mod traits;

pub use csv_source::CsvSource;
pub use snapshot::SnapshotSource;
pub use traits::ListingSource;
