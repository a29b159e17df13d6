use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::model::{IngestError, RawListing};
use crate::parser::{ListingPageParser, Parser};
use crate::source::traits::ListingSource;
use crate::vehicles::VehicleMatcher;

/// A directory of saved listing pages (`*.html`), read in file-name order.
pub struct SnapshotSource {
    dir: PathBuf,
    parser: ListingPageParser,
}

impl SnapshotSource {
    pub fn new(dir: impl Into<PathBuf>, vehicles: Arc<VehicleMatcher>) -> Self {
        Self {
            dir: dir.into(),
            parser: ListingPageParser::new(vehicles),
        }
    }

    async fn page_paths(&self) -> Result<Vec<PathBuf>, IngestError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_html = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
            if is_html {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[async_trait::async_trait]
impl ListingSource for SnapshotSource {
    async fn load(&self) -> Result<Vec<RawListing>, IngestError> {
        let paths = self.page_paths().await?;
        let pages = join_all(paths.iter().map(tokio::fs::read_to_string)).await;

        let listings: Vec<RawListing> = paths
            .iter()
            .zip(pages)
            .map(|(path, page)| {
                let origin = file_url(path);
                let parsed = page
                    .map_err(IngestError::from)
                    .and_then(|html| self.parser.parse(&html, &origin).map_err(IngestError::from));
                match parsed {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!("Failed to read snapshot {}: {}", path.display(), e);
                        let mut raw = RawListing::new("snapshot", origin);
                        raw.error = Some(e.to_string());
                        raw
                    }
                }
            })
            .collect();

        info!("Parsed {} snapshot pages from {}", listings.len(), self.dir.display());
        Ok(listings)
    }

    fn describe(&self) -> String {
        format!("snapshots:{}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::vehicles::VehicleCatalog;

    fn vehicles() -> Arc<VehicleMatcher> {
        Arc::new(VehicleMatcher::new(&VehicleCatalog::default()).unwrap())
    }

    #[tokio::test]
    async fn reads_pages_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b.html"),
            "<html><body><h1>2010 Porsche Boxster S</h1><p>$29,500</p></body></html>",
        )
        .unwrap();
        fs::write(
            dir.path().join("a.html"),
            "<html><body><h1>2012 Porsche Cayman R</h1><p>Transmission: 6-speed manual</p></body></html>",
        )
        .unwrap();
        fs::write(dir.path().join("a.html.bak"), "ignored").unwrap();
        fs::write(dir.path().join("c.html"), "<html><body></body></html>").unwrap();

        let source = SnapshotSource::new(dir.path(), vehicles());
        let rows = source.load().await.unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].model.as_deref(), Some("Cayman"));
        assert_eq!(rows[0].trim.as_deref(), Some("R"));
        assert_eq!(rows[0].transmission_raw.as_deref(), Some("6-speed manual"));
        assert!(rows[0].listing_url.ends_with("a.html"));

        assert_eq!(rows[1].trim.as_deref(), Some("S"));
        assert_eq!(rows[1].price_usd.as_deref(), Some("29500"));

        assert!(rows[2].is_failed());
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let source = SnapshotSource::new("/definitely/not/here", vehicles());
        assert!(matches!(source.load().await, Err(IngestError::Io(_))));
    }
}
