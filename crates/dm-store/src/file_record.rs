//! Append-only record of identifiers promoted to `checked`.

use dm_model::ValidatedFileRecord;

use crate::error::Result;
use crate::layout::DatasetLayout;
use crate::table::{read_table, write_table_atomic};

/// Every validated identifier so far; empty when no record exists yet.
pub fn load_file_record(layout: &DatasetLayout) -> Result<Vec<ValidatedFileRecord>> {
    let path = layout.file_record_path();
    if !path.is_file() {
        return Ok(Vec::new());
    }
    read_table(&path)
}

/// Append rows, keeping the record sorted by datetime then identifier.
pub fn append_file_record(layout: &DatasetLayout, additions: &[ValidatedFileRecord]) -> Result<()> {
    if additions.is_empty() {
        return Ok(());
    }
    let mut rows = load_file_record(layout)?;
    rows.extend_from_slice(additions);
    rows.sort_by(|a, b| {
        a.datetime
            .cmp(&b.datetime)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
    write_table_atomic(&layout.file_record_path(), &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(datetime: &str, identifier: &str) -> ValidatedFileRecord {
        ValidatedFileRecord {
            datetime: datetime.into(),
            user: "ci".into(),
            data_type: "zoom".into(),
            identifier: identifier.into(),
        }
    }

    #[test]
    fn appends_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path());
        append_file_record(&layout, &[row("2024-02-01_00-00", "sub-2_all_zoom_s1_r1_e1")]).unwrap();
        append_file_record(
            &layout,
            &[
                row("2024-01-01_00-00", "sub-9_all_zoom_s1_r1_e1"),
                row("2024-01-01_00-00", "sub-1_all_zoom_s1_r1_e1"),
            ],
        )
        .unwrap();
        let ids: Vec<String> = load_file_record(&layout)
            .unwrap()
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        assert_eq!(
            ids,
            vec![
                "sub-1_all_zoom_s1_r1_e1",
                "sub-9_all_zoom_s1_r1_e1",
                "sub-2_all_zoom_s1_r1_e1"
            ]
        );
    }
}
