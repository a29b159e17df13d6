use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::model::StorageError;

/// Writes `rows` with a header taken from the first row's field names.
/// An empty slice produces an empty file.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = ::csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
