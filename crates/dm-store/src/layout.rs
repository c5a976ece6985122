//! Directory layout of a monitored dataset.

use std::path::{Path, PathBuf};

use dm_model::{Identifier, SessionRun};

const DATA_MONITORING: &str = "data-monitoring";
const SOURCEDATA: &str = "sourcedata";

/// Paths of one dataset, rooted at its base directory.
///
/// ```text
/// <root>/
///   data-monitoring/
///     data-dictionary/central-tracker_datadict.csv
///     data-dictionary/central-tracker_datadict_latest.csv
///     pending/pending-{files,errors}-<ts>.csv
///     validated-file-record.csv
///     central-tracker_<dataset>.csv
///   sourcedata/
///     raw/<s_r>/<datatype>/sub-<id>/
///     pending-qa/<s_r>/<datatype>/sub-<id>/
///     pending-qa/qa-checklist.csv
///     checked/sub-<id>/<s_r>/<datatype>/
///     checked/redcap/*_DATA_*.csv
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final component of the root directory.
    pub fn dataset_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string())
    }

    pub fn data_monitoring_dir(&self) -> PathBuf {
        self.root.join(DATA_MONITORING)
    }

    pub fn datadict_path(&self) -> PathBuf {
        self.data_monitoring_dir()
            .join("data-dictionary")
            .join("central-tracker_datadict.csv")
    }

    pub fn datadict_latest_path(&self) -> PathBuf {
        self.data_monitoring_dir()
            .join("data-dictionary")
            .join("central-tracker_datadict_latest.csv")
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.data_monitoring_dir().join("pending")
    }

    pub fn file_record_path(&self) -> PathBuf {
        self.data_monitoring_dir().join("validated-file-record.csv")
    }

    pub fn tracker_path(&self) -> PathBuf {
        self.data_monitoring_dir()
            .join(format!("central-tracker_{}.csv", self.dataset_name()))
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(SOURCEDATA).join("raw")
    }

    pub fn pending_qa_dir(&self) -> PathBuf {
        self.root.join(SOURCEDATA).join("pending-qa")
    }

    pub fn checked_dir(&self) -> PathBuf {
        self.root.join(SOURCEDATA).join("checked")
    }

    pub fn checklist_path(&self) -> PathBuf {
        self.pending_qa_dir().join("qa-checklist.csv")
    }

    pub fn redcap_dir(&self) -> PathBuf {
        self.checked_dir().join("redcap")
    }

    /// `raw/<s_r>/<datatype>/sub-<id>` for an identifier.
    pub fn raw_group_dir(&self, identifier: &Identifier, datatype: &str) -> PathBuf {
        session_first(&self.raw_dir(), identifier.session_run(), datatype, identifier)
    }

    /// `pending-qa/<s_r>/<datatype>/sub-<id>` for an identifier.
    pub fn pending_qa_group_dir(&self, identifier: &Identifier, datatype: &str) -> PathBuf {
        session_first(
            &self.pending_qa_dir(),
            identifier.session_run(),
            datatype,
            identifier,
        )
    }

    /// `checked/sub-<id>/<s_r>/<datatype>` for an identifier.
    pub fn checked_group_dir(&self, identifier: &Identifier, datatype: &str) -> PathBuf {
        self.checked_dir()
            .join(identifier.subject.dir_name())
            .join(identifier.session_run().to_string())
            .join(datatype)
    }
}

fn session_first(base: &Path, session: SessionRun, datatype: &str, identifier: &Identifier) -> PathBuf {
    base.join(session.to_string())
        .join(datatype)
        .join(identifier.subject.dir_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_directories() {
        let layout = DatasetLayout::new("/data/thrive");
        let id: Identifier = "sub-3000000_all_eeg_s2_r1_e1".parse().unwrap();
        assert_eq!(
            layout.raw_group_dir(&id, "eeg"),
            PathBuf::from("/data/thrive/sourcedata/raw/s2_r1/eeg/sub-3000000")
        );
        assert_eq!(
            layout.pending_qa_group_dir(&id, "eeg"),
            PathBuf::from("/data/thrive/sourcedata/pending-qa/s2_r1/eeg/sub-3000000")
        );
        assert_eq!(
            layout.checked_group_dir(&id, "eeg"),
            PathBuf::from("/data/thrive/sourcedata/checked/sub-3000000/s2_r1/eeg")
        );
        assert_eq!(
            layout.tracker_path(),
            PathBuf::from("/data/thrive/data-monitoring/central-tracker_thrive.csv")
        );
    }
}
