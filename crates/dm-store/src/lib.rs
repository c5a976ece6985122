//! Dataset storage for the study data monitor.
//!
//! Owns the directory layout of a dataset and every table persisted under
//! it: pending snapshots, the QA checklist and the validated-file record.
//! Tables are plain CSV written atomically; snapshots are never overwritten.

pub mod checklist;
pub mod error;
pub mod file_record;
pub mod fs_ops;
pub mod layout;
pub mod pending;
pub mod table;

#[cfg(feature = "fixtures")]
pub mod fixture;

pub use checklist::{load_or_create_checklist, save_checklist};
pub use error::{Result, StoreError};
pub use file_record::{append_file_record, load_file_record};
pub use fs_ops::{
    copy_file, ensure_vacant, file_name_of, is_empty_file, list_dirs_sorted, list_files_sorted,
    move_file, remove_empty_dirs, remove_file,
};
pub use layout::DatasetLayout;
pub use pending::{
    SnapshotKind, latest_pending_files, list_snapshots, snapshot_timestamp, write_pending_errors,
    write_pending_files,
};
pub use table::{TableRow, read_records, read_table, write_records_atomic, write_table_atomic};
