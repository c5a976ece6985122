//! Per-run context shared by every stage of one invocation.

use chrono::{Local, NaiveDateTime};

/// Minute-resolution timestamp used in snapshot names and `datetime` columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// Timestamp and user recorded on every row written during one run.
///
/// Both pending snapshots of a raw validation run carry the same timestamp,
/// so the context is created once and passed to each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    timestamp: String,
    user: String,
}

impl RunContext {
    pub fn new(timestamp: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            user: user.into(),
        }
    }

    /// Context stamped with the current local minute and the invoking user.
    pub fn now() -> Self {
        Self::at(Local::now().naive_local(), current_user())
    }

    pub fn at(datetime: NaiveDateTime, user: impl Into<String>) -> Self {
        Self::new(datetime.format(TIMESTAMP_FORMAT).to_string(), user)
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
