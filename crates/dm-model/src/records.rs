//! Row types of the persisted monitoring tables.
//!
//! Field order matches the canonical column order of each CSV file.

use serde::{Deserialize, Serialize};

/// Row of a `pending-files-<ts>.csv` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    pub datetime: String,
    pub user: String,
    #[serde(with = "flag")]
    pub pass_raw: bool,
    pub identifier: String,
    pub identifier_details: String,
    #[serde(default)]
    pub error_type: String,
    #[serde(default)]
    pub error_details: String,
}

/// Row of a `pending-errors-<ts>.csv` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingError {
    pub datetime: String,
    pub user: String,
    pub identifier: String,
    pub identifier_details: String,
    pub error_type: String,
    pub error_details: String,
}

impl From<&PendingEntry> for PendingError {
    fn from(entry: &PendingEntry) -> Self {
        Self {
            datetime: entry.datetime.clone(),
            user: entry.user.clone(),
            identifier: entry.identifier.clone(),
            identifier_details: entry.identifier_details.clone(),
            error_type: entry.error_type.clone(),
            error_details: entry.error_details.clone(),
        }
    }
}

/// Row of `sourcedata/pending-qa/qa-checklist.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaChecklistEntry {
    pub datetime: String,
    pub user: String,
    pub identifier: String,
    pub identifier_details: String,
    #[serde(with = "flag")]
    pub qa: bool,
    #[serde(with = "flag")]
    pub local_move: bool,
}

impl QaChecklistEntry {
    pub fn ready_to_promote(&self) -> bool {
        self.qa && self.local_move
    }
}

/// Row of the append-only `validated-file-record.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedFileRecord {
    pub datetime: String,
    pub user: String,
    pub data_type: String,
    pub identifier: String,
}

/// 0/1 columns. Spreadsheet edits often turn `1` into `1.0`, so any
/// numeric text equal to one reads as set.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "1" } else { "0" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(false);
        }
        match raw.parse::<f64>() {
            Ok(number) => Ok(number == 1.0),
            Err(_) => Err(serde::de::Error::custom(format!(
                "expected 0 or 1, found {raw:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checklist_json_uses_column_names() {
        let entry = QaChecklistEntry {
            datetime: "2024-01-01_12-30".into(),
            user: "qa".into(),
            identifier: "sub-1_all_eeg_s1_r1_e1".into(),
            identifier_details: "sub-1/all_eeg/s1_r1_e1 (eeg)".into(),
            qa: true,
            local_move: false,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["localMove"], "0");
        assert_eq!(value["qa"], "1");
        assert_eq!(value["identifierDetails"], "sub-1/all_eeg/s1_r1_e1 (eeg)");
        assert!(!entry.ready_to_promote());
    }

    #[test]
    fn flag_accepts_spreadsheet_floats() {
        let json = r#"{"datetime":"d","user":"u","identifier":"i","identifierDetails":"x","qa":"1.0","localMove":" 1 "}"#;
        let entry: QaChecklistEntry = serde_json::from_str(json).unwrap();
        assert!(entry.ready_to_promote());
        let bad = r#"{"datetime":"d","user":"u","identifier":"i","identifierDetails":"x","qa":"yes","localMove":"1"}"#;
        assert!(serde_json::from_str::<QaChecklistEntry>(bad).is_err());
    }
}
