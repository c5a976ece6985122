//! Reading and writing the monitoring CSV tables.

use std::fs::{self, File};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use dm_model::{PendingEntry, PendingError, QaChecklistEntry, ValidatedFileRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, StoreError};

/// A persisted table row with a fixed column set.
pub trait TableRow: Serialize + DeserializeOwned {
    /// Canonical columns in output order.
    const COLUMNS: &'static [&'static str];
}

impl TableRow for PendingEntry {
    const COLUMNS: &'static [&'static str] = &[
        "datetime",
        "user",
        "passRaw",
        "identifier",
        "identifierDetails",
        "errorType",
        "errorDetails",
    ];
}

impl TableRow for PendingError {
    const COLUMNS: &'static [&'static str] = &[
        "datetime",
        "user",
        "identifier",
        "identifierDetails",
        "errorType",
        "errorDetails",
    ];
}

impl TableRow for QaChecklistEntry {
    const COLUMNS: &'static [&'static str] = &[
        "datetime",
        "user",
        "identifier",
        "identifierDetails",
        "qa",
        "localMove",
    ];
}

impl TableRow for ValidatedFileRecord {
    const COLUMNS: &'static [&'static str] = &["datetime", "user", "dataType", "identifier"];
}

/// Read every row of a table. Column order is not significant.
pub fn read_table<T: TableRow>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| StoreError::io("read", path, e))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers: StringRecord = reader
        .headers()
        .map_err(|e| StoreError::csv(path, &e))?
        .iter()
        .map(|h| h.trim_matches('\u{feff}').trim())
        .collect();
    for column in T::COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(StoreError::MissingColumn {
                path: path.to_path_buf(),
                column: (*column).to_string(),
            });
        }
    }
    reader.set_headers(headers);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record.map_err(|e| StoreError::csv(path, &e))?);
    }
    Ok(rows)
}

/// Write a table through a temp file and rename it into place.
pub fn write_table_atomic<T: TableRow>(path: &Path, rows: &[T]) -> Result<()> {
    write_atomic(path, T::COLUMNS, rows.len(), |writer, temp_path| {
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| StoreError::csv(temp_path, &e))?;
        }
        Ok(())
    })
}

/// Header and raw records of a table whose columns are only known at runtime.
pub fn read_records(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let file = File::open(path).map_err(|e| StoreError::io("read", path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StoreError::csv(path, &e))?
        .iter()
        .map(|h| h.trim_matches('\u{feff}').trim().to_string())
        .collect();
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StoreError::csv(path, &e))?;
        records.push(record.iter().map(|v| v.trim().to_string()).collect());
    }
    Ok((headers, records))
}

/// Atomic write of a runtime-column table.
pub fn write_records_atomic(path: &Path, headers: &[String], records: &[Vec<String>]) -> Result<()> {
    write_atomic(path, headers, records.len(), |writer, temp_path| {
        for record in records {
            writer
                .write_record(record)
                .map_err(|e| StoreError::csv(temp_path, &e))?;
        }
        Ok(())
    })
}

fn write_atomic<H, F>(path: &Path, headers: &[H], row_count: usize, write_rows: F) -> Result<()>
where
    H: AsRef<[u8]>,
    F: FnOnce(&mut csv::Writer<File>, &Path) -> Result<()>,
{
    let temp_path = path.with_extension("csv.tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory", parent, e))?;
    }

    let file = File::create(&temp_path).map_err(|e| StoreError::io("create", &temp_path, e))?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer
        .write_record(headers)
        .map_err(|e| StoreError::csv(&temp_path, &e))?;
    write_rows(&mut writer, &temp_path)?;
    let file = writer
        .into_inner()
        .map_err(|e| StoreError::io("write", &temp_path, e.into_error()))?;
    file.sync_all()
        .map_err(|e| StoreError::io("sync", &temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::AtomicWriteFailed {
        temp_path: temp_path.clone(),
        target_path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(rows = row_count, "Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(datetime: &str, identifier: &str) -> ValidatedFileRecord {
        ValidatedFileRecord {
            datetime: datetime.into(),
            user: "ci".into(),
            data_type: "eeg".into(),
            identifier: identifier.into(),
        }
    }

    #[test]
    fn empty_table_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("record.csv");
        write_table_atomic::<ValidatedFileRecord>(&path, &[]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "datetime,user,dataType,identifier\n"
        );
        assert!(read_table::<ValidatedFileRecord>(&path).unwrap().is_empty());
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn reads_reordered_columns_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.csv");
        fs::write(
            &path,
            "\u{feff}identifier,dataType,user,datetime\nsub-1_all_eeg_s1_r1_e1,eeg,ci,2024-01-01_10-00\n",
        )
        .unwrap();
        let rows = read_table::<ValidatedFileRecord>(&path).unwrap();
        assert_eq!(rows, vec![record("2024-01-01_10-00", "sub-1_all_eeg_s1_r1_e1")]);
    }

    #[test]
    fn missing_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.csv");
        fs::write(&path, "datetime,user,identifier\n").unwrap();
        let err = read_table::<ValidatedFileRecord>(&path).unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { column, .. } if column == "dataType"));
    }

    #[test]
    fn runtime_columns_keep_duplicates_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.csv");
        let headers = vec!["id".to_string(), "a".to_string(), "a".to_string()];
        write_records_atomic(&path, &headers, &[vec!["1".into(), "NA".into(), "0".into()]]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "id,a,a\n1,NA,0\n");
        let (read_headers, records) = read_records(&path).unwrap();
        assert_eq!(read_headers, headers);
        assert_eq!(records, vec![vec!["1", "NA", "0"]]);
    }
}
