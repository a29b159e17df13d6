use std::path::PathBuf;

use csv::{ReaderBuilder, Trim};
use tracing::{info, warn};

use crate::model::{IngestError, RawListing};
use crate::source::traits::ListingSource;

/// Scraper output as a CSV file with the listing header row.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Parses CSV text. Rows that do not fit the header are skipped with a warning.
pub fn read_listings(data: &[u8]) -> Result<Vec<RawListing>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let mut listings = Vec::new();
    for (line, record) in reader.deserialize::<RawListing>().enumerate() {
        match record {
            Ok(raw) => listings.push(raw),
            // Data rows start on line 2.
            Err(e) => warn!("Skipping CSV row {}: {}", line + 2, e),
        }
    }
    Ok(listings)
}

#[async_trait::async_trait]
impl ListingSource for CsvSource {
    async fn load(&self) -> Result<Vec<RawListing>, IngestError> {
        let data = tokio::fs::read(&self.path).await?;
        let listings = read_listings(&data)?;
        info!("Read {} rows from {}", listings.len(), self.path.display());
        Ok(listings)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}
