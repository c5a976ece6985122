//! Detect changes to the data dictionary against its known-good copy.

use std::path::Path;

use tracing::{debug, error};

use crate::csv_utils::read_csv_table;
use crate::error::{DictionaryError, Result};
use crate::hash::file_sha256;

/// Fail with [`DictionaryError::Drift`] when `current` differs from `known_good`.
///
/// Byte-identical files short-circuit on their SHA-256. Otherwise both are
/// parsed and compared cell by cell, so quoting or trailing whitespace
/// alone is not drift.
pub fn check_drift(current: &Path, known_good: &Path) -> Result<()> {
    if !known_good.is_file() {
        return Err(DictionaryError::MissingReference {
            path: known_good.to_path_buf(),
        });
    }
    let current_hash = file_sha256(current)?;
    let known_hash = file_sha256(known_good)?;
    if current_hash == known_hash {
        debug!(sha256 = %current_hash, "data dictionary unchanged");
        return Ok(());
    }

    let drift = |detail: String| {
        error!(path = %current.display(), %detail, "data dictionary has changed");
        DictionaryError::Drift {
            path: current.to_path_buf(),
            detail,
        }
    };

    let now = read_csv_table(current)?;
    let before = read_csv_table(known_good)?;
    if now.headers != before.headers {
        return Err(drift(format!(
            "columns [{}] differ from [{}]",
            now.headers.join(", "),
            before.headers.join(", ")
        )));
    }
    if now.rows.len() != before.rows.len() {
        return Err(drift(format!(
            "{} rows, expected {}",
            now.rows.len(),
            before.rows.len()
        )));
    }
    for (row_now, row_before) in now.rows.iter().zip(&before.rows) {
        for header in &now.headers {
            if row_now.get(header) != row_before.get(header) {
                let variable = row_before
                    .get("variable")
                    .map(String::as_str)
                    .unwrap_or("(unnamed)");
                return Err(drift(format!(
                    "field {header} of variable {variable} changed"
                )));
            }
        }
    }
    debug!("data dictionary differs only in formatting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DICT: &str = "variable,dataType,provenance\nid,id,\"file: \"\"x\"\"\"\nall_eeg,eeg,direct-eeg\n";

    fn write_pair(current: &str, known: &str) -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("datadict.csv");
        let b = dir.path().join("datadict_latest.csv");
        fs::write(&a, current).unwrap();
        fs::write(&b, known).unwrap();
        (dir, a, b)
    }

    #[test]
    fn identical_files_pass() {
        let (_dir, a, b) = write_pair(DICT, DICT);
        check_drift(&a, &b).unwrap();
    }

    #[test]
    fn formatting_only_difference_passes() {
        let reformatted = DICT.replace("all_eeg,eeg", "\"all_eeg\", eeg");
        let (_dir, a, b) = write_pair(&reformatted, DICT);
        check_drift(&a, &b).unwrap();
    }

    #[test]
    fn changed_field_names_variable() {
        let changed = DICT.replace("direct-eeg", "direct-biosemi");
        let (_dir, a, b) = write_pair(&changed, DICT);
        let err = check_drift(&a, &b).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Data dictionary has changed"), "{message}");
        assert!(message.contains("field provenance of variable all_eeg"), "{message}");
    }

    #[test]
    fn added_row_is_drift() {
        let grown = format!("{DICT}all_zoom,zoom,direct-zoom\n");
        let (_dir, a, b) = write_pair(&grown, DICT);
        assert!(matches!(check_drift(&a, &b), Err(DictionaryError::Drift { .. })));
    }

    #[test]
    fn missing_known_good_copy_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("datadict.csv");
        fs::write(&a, DICT).unwrap();
        let err = check_drift(&a, &dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, DictionaryError::MissingReference { .. }));
    }
}
