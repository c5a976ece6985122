//! QA lifecycle of monitored data.
//!
//! Data that passed raw validation is copied into `sourcedata/pending-qa/`
//! and listed on the QA checklist. Once a reviewer marks a row `qa=1` and
//! `localMove=1`, the next cycle moves its files to `sourcedata/checked/`
//! and records the identifier in the validated-file record.

pub mod error;
pub mod file_set;
pub mod qa;

pub use error::{LifecycleError, Result};
pub use file_set::identifier_files;
pub use qa::{QaCycleReport, QaFailure, QaLifecycle, run_qa_cycle};
