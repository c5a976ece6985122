//! Timestamped pending snapshots under `data-monitoring/pending/`.
//!
//! Snapshots are history: a run only ever adds a new file, and only when
//! its timestamp is newer than every snapshot of the same kind already on
//! disk.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use dm_model::{PendingEntry, PendingError, RunContext};
use regex::Regex;
use tracing::{info, warn};

use crate::error::Result;
use crate::fs_ops::list_files_sorted;
use crate::layout::DatasetLayout;
use crate::table::{TableRow, read_table, write_table_atomic};

static SNAPSHOT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^pending-(?P<kind>files|errors)-(?P<ts>\d{4}-\d{2}-\d{2}_\d{2}-\d{2})\.csv$")
        .expect("Invalid snapshot regex")
});

/// Which pending table a snapshot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Files,
    Errors,
}

impl SnapshotKind {
    fn token(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Errors => "errors",
        }
    }

    pub fn file_name(&self, timestamp: &str) -> String {
        format!("pending-{}-{timestamp}.csv", self.token())
    }
}

/// Existing snapshots of one kind, oldest first.
pub fn list_snapshots(layout: &DatasetLayout, kind: SnapshotKind) -> Result<Vec<(String, PathBuf)>> {
    let dir = layout.pending_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut snapshots: Vec<(String, PathBuf)> = list_files_sorted(&dir)?
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            let caps = SNAPSHOT_REGEX.captures(&name)?;
            (&caps["kind"] == kind.token()).then(|| (caps["ts"].to_string(), path.clone()))
        })
        .collect();
    snapshots.sort();
    Ok(snapshots)
}

/// Rows of the newest `pending-files` snapshot, if any exists.
pub fn latest_pending_files(layout: &DatasetLayout) -> Result<Option<(PathBuf, Vec<PendingEntry>)>> {
    let Some((_, path)) = list_snapshots(layout, SnapshotKind::Files)?.pop() else {
        return Ok(None);
    };
    let rows = read_table(&path)?;
    Ok(Some((path, rows)))
}

/// Write `pending-files-<ts>.csv`. Returns `None` when an equal or newer
/// snapshot already exists.
pub fn write_pending_files(
    layout: &DatasetLayout,
    ctx: &RunContext,
    entries: &[PendingEntry],
) -> Result<Option<PathBuf>> {
    let mut rows = entries.to_vec();
    rows.sort_by(|a, b| {
        a.identifier
            .cmp(&b.identifier)
            .then_with(|| a.datetime.cmp(&b.datetime))
    });
    write_snapshot(layout, SnapshotKind::Files, ctx.timestamp(), &rows)
}

/// Write `pending-errors-<ts>.csv`. Returns `None` when an equal or newer
/// snapshot already exists.
pub fn write_pending_errors(
    layout: &DatasetLayout,
    ctx: &RunContext,
    errors: &[PendingError],
) -> Result<Option<PathBuf>> {
    let mut rows = errors.to_vec();
    rows.sort_by(|a, b| {
        a.identifier
            .cmp(&b.identifier)
            .then_with(|| a.datetime.cmp(&b.datetime))
    });
    write_snapshot(layout, SnapshotKind::Errors, ctx.timestamp(), &rows)
}

fn write_snapshot<T: TableRow>(
    layout: &DatasetLayout,
    kind: SnapshotKind,
    timestamp: &str,
    rows: &[T],
) -> Result<Option<PathBuf>> {
    if let Some((newest, path)) = list_snapshots(layout, kind)?.pop()
        && newest.as_str() >= timestamp
    {
        warn!(
            existing = %path.display(),
            timestamp,
            "pending snapshot not written; an equal or newer one exists"
        );
        return Ok(None);
    }
    let path = layout.pending_dir().join(kind.file_name(timestamp));
    write_table_atomic(&path, rows)?;
    info!(rows = rows.len(), "Saved pending snapshot to {}", path.display());
    Ok(Some(path))
}

/// Timestamp portion of a snapshot path.
pub fn snapshot_timestamp(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    SNAPSHOT_REGEX
        .captures(name)
        .map(|caps| caps["ts"].to_string())
}
