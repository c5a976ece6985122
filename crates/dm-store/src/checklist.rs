//! The QA checklist in `sourcedata/pending-qa/qa-checklist.csv`.

use dm_model::QaChecklistEntry;
use tracing::{info, warn};

use crate::error::Result;
use crate::layout::DatasetLayout;
use crate::table::{read_table, write_table_atomic};

/// Load the checklist, recreating it empty when it is missing or unreadable.
pub fn load_or_create_checklist(layout: &DatasetLayout) -> Result<Vec<QaChecklistEntry>> {
    let path = layout.checklist_path();
    if path.is_file() {
        match read_table(&path) {
            Ok(entries) => return Ok(entries),
            Err(error) => warn!(%error, "QA checklist unreadable; recreating it empty"),
        }
    } else {
        info!("No QA checklist found; creating {}", path.display());
    }
    write_table_atomic::<QaChecklistEntry>(&path, &[])?;
    Ok(Vec::new())
}

pub fn save_checklist(layout: &DatasetLayout, entries: &[QaChecklistEntry]) -> Result<()> {
    write_table_atomic(&layout.checklist_path(), entries)
}
