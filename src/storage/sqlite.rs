use std::fs;
use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, params};

use crate::model::{RankedRow, RawListing, StorageError};

pub struct SqliteStorage {
    conn: Connection,
}

/// A ranked row as read back from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRanking {
    pub run_id: String,
    pub rank: i64,
    pub model_trim: String,
    pub mileage: Option<u32>,
    pub total_options_msrp: Option<i64>,
    pub deal_delta_usd: Option<i64>,
    pub deal_quality: Option<String>,
    pub listing_url: String,
}

impl SqliteStorage {
    /// Opens (or creates) the database and its tables.
    pub fn new(db_path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS ranked_listings (
                run_id TEXT NOT NULL,
                rank INTEGER NOT NULL,
                year INTEGER,
                model TEXT,
                trim TEXT,
                model_trim TEXT NOT NULL,
                transmission TEXT,
                asking_price_usd INTEGER,
                mileage INTEGER,
                mileage_band TEXT,
                total_options_msrp INTEGER,
                fair_value_usd INTEGER,
                deal_delta_usd INTEGER,
                deal_quality TEXT,
                options_list TEXT NOT NULL DEFAULT '',
                exterior TEXT,
                interior TEXT,
                exterior_bucket TEXT,
                interior_bucket TEXT,
                vin TEXT,
                location TEXT,
                source TEXT NOT NULL,
                listing_url TEXT NOT NULL,
                source_url TEXT NOT NULL,
                written_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS failed_listings (
                run_id TEXT NOT NULL,
                source TEXT NOT NULL,
                listing_url TEXT NOT NULL,
                error TEXT,
                raw_json TEXT NOT NULL
            );
            ",
        )?;

        Ok(Self { conn })
    }

    /// Replaces the whole ranking table with this run's rows.
    pub fn replace_ranking(
        &mut self,
        run_id: &str,
        rows: &[RankedRow],
    ) -> Result<(), StorageError> {
        let written_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM ranked_listings", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ranked_listings (
                    run_id, rank, year, model, trim, model_trim, transmission,
                    asking_price_usd, mileage, mileage_band, total_options_msrp,
                    fair_value_usd, deal_delta_usd, deal_quality, options_list,
                    exterior, interior, exterior_bucket, interior_bucket,
                    vin, location, source, listing_url, source_url, written_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
                )",
            )?;
            for row in rows {
                stmt.execute(params![
                    run_id,
                    row.rank as i64,
                    row.year,
                    row.model,
                    row.trim,
                    row.model_trim,
                    row.transmission.map(|t| t.as_str()),
                    row.asking_price_usd,
                    row.mileage,
                    row.mileage_band.map(|b| b.label()),
                    row.total_options_msrp,
                    row.fair_value_usd,
                    row.deal_delta_usd,
                    row.deal_quality.map(|q| q.as_str()),
                    row.options_list,
                    row.exterior,
                    row.interior,
                    row.exterior_bucket.map(|b| b.as_str()),
                    row.interior_bucket.map(|b| b.as_str()),
                    row.vin,
                    row.location,
                    row.source,
                    row.listing_url,
                    row.source_url,
                    written_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Failed rows are appended per run for auditing.
    pub fn record_failed(&mut self, run_id: &str, rows: &[RawListing]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM failed_listings WHERE run_id = ?1", params![run_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO failed_listings (run_id, source, listing_url, error, raw_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for raw in rows {
                let raw_json = serde_json::to_string(raw)?;
                stmt.execute(params![run_id, raw.source, raw.listing_url, raw.error, raw_json])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_ranking(&self) -> Result<Vec<StoredRanking>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, rank, model_trim, mileage, total_options_msrp,
                    deal_delta_usd, deal_quality, listing_url
             FROM ranked_listings ORDER BY rank",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredRanking {
                    run_id: row.get(0)?,
                    rank: row.get(1)?,
                    model_trim: row.get(2)?,
                    mileage: row.get(3)?,
                    total_options_msrp: row.get(4)?,
                    deal_delta_usd: row.get(5)?,
                    deal_quality: row.get(6)?,
                    listing_url: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn failed_count(&self, run_id: &str) -> Result<usize, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM failed_listings WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DealQuality, MileageBand, Transmission};

    fn row(rank: usize, url: &str) -> RankedRow {
        RankedRow {
            rank,
            year: Some(2010),
            model: Some("Cayman".into()),
            trim: None,
            model_trim: "2010 Cayman".into(),
            transmission: Some(Transmission::Manual),
            asking_price_usd: Some(30000),
            mileage: None,
            mileage_band: None,
            total_options_msrp: None,
            fair_value_usd: Some(31000),
            deal_delta_usd: Some(1000),
            deal_quality: Some(DealQuality::Good),
            options_list: String::new(),
            exterior: None,
            interior: None,
            exterior_bucket: None,
            interior_bucket: None,
            vin: None,
            location: None,
            source: "cars.com".into(),
            listing_url: url.into(),
            source_url: url.into(),
        }
    }

    #[test]
    fn ranking_is_replaced_each_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SqliteStorage::new(&dir.path().join("db/listings.db")).unwrap();

        storage
            .replace_ranking("run1", &[row(1, "https://a"), row(2, "https://b")])
            .unwrap();
        let mut second = row(1, "https://c");
        second.mileage = Some(65_000);
        second.mileage_band = Some(MileageBand::From60k);
        storage.replace_ranking("run2", &[second]).unwrap();

        let stored = storage.load_ranking().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].run_id, "run2");
        assert_eq!(stored[0].listing_url, "https://c");
        assert_eq!(stored[0].mileage, Some(65_000));
        assert_eq!(stored[0].deal_quality.as_deref(), Some("Good Deal"));
    }

    #[test]
    fn missing_mileage_is_stored_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SqliteStorage::new(&dir.path().join("listings.db")).unwrap();
        storage.replace_ranking("run1", &[row(1, "https://a")]).unwrap();
        let stored = storage.load_ranking().unwrap();
        assert_eq!(stored[0].mileage, None);
        assert_eq!(stored[0].total_options_msrp, None);
    }

    #[test]
    fn failed_rows_are_kept_for_audit() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SqliteStorage::new(&dir.path().join("listings.db")).unwrap();
        let mut raw = RawListing::new("cars.com", "https://cars.com/x");
        raw.error = Some("captcha".into());
        storage.record_failed("run1", &[raw.clone(), raw]).unwrap();
        assert_eq!(storage.failed_count("run1").unwrap(), 2);
        assert_eq!(storage.failed_count("run2").unwrap(), 0);
    }
}
