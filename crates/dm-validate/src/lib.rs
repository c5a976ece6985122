//! Validation of monitored dataset trees.
//!
//! [`Resolver`] turns file names into identifiers and naming issues;
//! [`ValidationEngine`] applies presence, exception, combination and content
//! rules to every group directory of the raw or checked tree and produces a
//! [`ValidationReport`] that the lifecycle and tracker consume.

pub mod content;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod resolver;

pub use content::{ContentCheck, ContentInput, ContentRegistry, EegCheck, PsychopyCheck};
pub use discovery::{Group, Stage, discover_groups, relative_path};
pub use engine::{ErrorRecord, GroupReport, IdentifierOutcome, ValidationEngine, ValidationReport};
pub use error::{Result, ValidateError};
pub use resolver::{FileClass, Resolver};
