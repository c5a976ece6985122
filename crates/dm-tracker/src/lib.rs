//! Central tracker derivation for the study data monitor.
//!
//! The tracker has one row per subject and one column per dictionary
//! variable and suffix. File-backed columns come from a
//! [`dm_validate::ValidationReport`], REDCap columns from the newest
//! exports under `sourcedata/checked/redcap/`, and combination and status
//! columns are folded from their members with [`TrackerValue::any`] and
//! [`TrackerValue::all`].

pub mod error;
pub mod redcap;
pub mod rules;
pub mod tracker;
pub mod value;

pub use error::{Result, TrackerError};
pub use redcap::{ColumnRemap, RedcapBinding, RedcapExport, RedcapExports, completion_column};
pub use rules::{KindRule, column_name};
pub use tracker::{
    TrackerOptions, TrackerRow, TrackerTable, bind_redcap, derive_tracker, existing_subjects,
    update_tracker,
};
pub use value::TrackerValue;
