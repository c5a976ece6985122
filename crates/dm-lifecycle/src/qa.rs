//! Staging passed raw data for QA and promoting approved data to checked.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use dm_dictionary::DataDictionary;
use dm_model::{Identifier, PendingEntry, QaChecklistEntry, RunContext, ValidatedFileRecord};
use dm_store::{
    DatasetLayout, append_file_record, copy_file, ensure_vacant, file_name_of,
    latest_pending_files, load_file_record, load_or_create_checklist, move_file,
    remove_empty_dirs, remove_file, save_checklist,
};
use dm_validate::Resolver;
use tracing::{error, info, info_span, warn};

use crate::error::Result;
use crate::file_set::identifier_files;

/// An identifier that could not be staged or promoted this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaFailure {
    pub identifier: String,
    pub reason: String,
}

/// Outcome of one QA cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QaCycleReport {
    /// Identifiers copied to pending-qa and added to the checklist.
    pub staged: Vec<String>,
    /// Identifiers moved to checked and recorded as validated.
    pub promoted: Vec<String>,
    pub failures: Vec<QaFailure>,
    /// Empty directories removed from pending-qa.
    pub pruned_dirs: usize,
}

impl QaCycleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, identifier: &str, reason: impl Into<String>) {
        let reason = reason.into();
        error!(identifier, %reason, "QA step failed");
        self.failures.push(QaFailure {
            identifier: identifier.to_string(),
            reason,
        });
    }
}

/// Drives files through `raw -> pending-qa -> checked`.
#[derive(Debug, Clone, Copy)]
pub struct QaLifecycle<'a> {
    layout: &'a DatasetLayout,
    dictionary: &'a DataDictionary,
    resolver: Resolver<'a>,
}

impl<'a> QaLifecycle<'a> {
    pub fn new(
        layout: &'a DatasetLayout,
        dictionary: &'a DataDictionary,
        legacy_exceptions: bool,
    ) -> Self {
        Self {
            layout,
            dictionary,
            resolver: Resolver::new(dictionary, legacy_exceptions),
        }
    }

    /// Ensure the checklist exists, promote approved rows, then stage newly
    /// passed identifiers. Running it twice in a row changes nothing the
    /// second time.
    pub fn run_cycle(&self, ctx: &RunContext) -> Result<QaCycleReport> {
        let span = info_span!("qa_cycle", dataset = %self.layout.dataset_name());
        let _guard = span.enter();

        let mut checklist = load_or_create_checklist(self.layout)?;
        let mut report = QaCycleReport::default();
        self.promote_approved(ctx, &mut checklist, &mut report)?;
        self.stage_passed(ctx, &mut checklist, &mut report)?;
        save_checklist(self.layout, &checklist)?;

        info!(
            staged = report.staged.len(),
            promoted = report.promoted.len(),
            failures = report.failures.len(),
            "QA cycle complete"
        );
        Ok(report)
    }

    /// Move every `qa=1, localMove=1` row from pending-qa to checked.
    ///
    /// Promoted rows leave `checklist` and are appended to the validated-file
    /// record. A row whose files cannot be moved stays on the checklist.
    pub fn promote_approved(
        &self,
        ctx: &RunContext,
        checklist: &mut Vec<QaChecklistEntry>,
        report: &mut QaCycleReport,
    ) -> Result<()> {
        let mut records = Vec::new();
        let mut remaining = Vec::with_capacity(checklist.len());
        for entry in checklist.drain(..) {
            if !entry.ready_to_promote() {
                remaining.push(entry);
                continue;
            }
            match self.promote_one(&entry) {
                Ok(data_type) => {
                    info!(identifier = %entry.identifier, "Promoted to checked");
                    records.push(ValidatedFileRecord {
                        datetime: ctx.timestamp().to_string(),
                        user: ctx.user().to_string(),
                        data_type,
                        identifier: entry.identifier.clone(),
                    });
                    report.promoted.push(entry.identifier);
                }
                Err(reason) => {
                    report.fail(&entry.identifier, reason);
                    remaining.push(entry);
                }
            }
        }
        *checklist = remaining;

        append_file_record(self.layout, &records)?;
        save_checklist(self.layout, checklist)?;
        report.pruned_dirs += remove_empty_dirs(&self.layout.pending_qa_dir())?;
        Ok(())
    }

    fn promote_one(&self, entry: &QaChecklistEntry) -> std::result::Result<String, String> {
        let (identifier, datatype) = self.locate(&entry.identifier)?;
        let source = self.layout.pending_qa_group_dir(&identifier, &datatype);
        let files = identifier_files(&source, &identifier, self.resolver)
            .map_err(|e| e.to_string())?;
        if files.is_empty() {
            return Err(format!("no files found in {}", source.display()));
        }
        let dest = self.layout.checked_group_dir(&identifier, &datatype);
        Transfer::Move.run(&files, &dest)?;
        Ok(datatype)
    }

    /// Copy identifiers that passed raw validation into pending-qa and add
    /// them to the checklist.
    ///
    /// Candidates come from the newest `pending-files` snapshot: rows with
    /// `passRaw=1` whose identifier has no error row in that snapshot, is not
    /// on the checklist and has never been validated.
    pub fn stage_passed(
        &self,
        ctx: &RunContext,
        checklist: &mut Vec<QaChecklistEntry>,
        report: &mut QaCycleReport,
    ) -> Result<()> {
        let Some((snapshot, entries)) = latest_pending_files(self.layout)? else {
            info!("No pending-files snapshot; nothing to stage");
            return Ok(());
        };
        info!(snapshot = %snapshot.display(), "Staging passed identifiers");

        let mut excluded: BTreeSet<String> = checklist
            .iter()
            .map(|entry| entry.identifier.clone())
            .collect();
        excluded.extend(
            load_file_record(self.layout)?
                .into_iter()
                .map(|record| record.identifier),
        );

        for identifier in passed_identifiers(&entries) {
            if excluded.contains(&identifier) {
                continue;
            }
            match self.stage_one(&identifier) {
                Ok(details) => {
                    info!(%identifier, "Staged for QA");
                    checklist.push(QaChecklistEntry {
                        datetime: ctx.timestamp().to_string(),
                        user: ctx.user().to_string(),
                        identifier: identifier.clone(),
                        identifier_details: details,
                        qa: false,
                        local_move: false,
                    });
                    report.staged.push(identifier);
                }
                Err(reason) => report.fail(&identifier, reason),
            }
        }
        Ok(())
    }

    fn stage_one(&self, raw_identifier: &str) -> std::result::Result<String, String> {
        let (identifier, datatype) = self.locate(raw_identifier)?;
        let source = self.layout.raw_group_dir(&identifier, &datatype);
        let files = identifier_files(&source, &identifier, self.resolver)
            .map_err(|e| e.to_string())?;
        if files.is_empty() {
            return Err(format!("no files found in {}", source.display()));
        }
        let dest = self.layout.pending_qa_group_dir(&identifier, &datatype);
        Transfer::Copy.run(&files, &dest)?;
        Ok(identifier.detailed(
            &datatype,
            self.dictionary.is_combination_member(&identifier.variable),
        ))
    }

    fn locate(&self, raw_identifier: &str) -> std::result::Result<(Identifier, String), String> {
        let identifier = raw_identifier
            .parse::<Identifier>()
            .map_err(|e| e.to_string())?;
        let Some(datatype) = self.dictionary.datatype_of(&identifier.variable) else {
            return Err(format!(
                "variable {} is not in the data dictionary",
                identifier.variable
            ));
        };
        Ok((identifier, datatype.to_string()))
    }
}

/// Identifiers with a pass row and no failure row, in snapshot order.
fn passed_identifiers(entries: &[PendingEntry]) -> Vec<String> {
    let failed: BTreeSet<&str> = entries
        .iter()
        .filter(|entry| !entry.pass_raw)
        .map(|entry| entry.identifier.as_str())
        .collect();
    let mut seen = BTreeSet::new();
    entries
        .iter()
        .filter(|entry| entry.pass_raw && !failed.contains(entry.identifier.as_str()))
        .filter(|entry| seen.insert(entry.identifier.as_str()))
        .map(|entry| entry.identifier.clone())
        .collect()
}

/// How an identifier's files travel between trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Copy,
    Move,
}

impl Transfer {
    fn apply(self, from: &Path, to: &Path) -> dm_store::Result<()> {
        match self {
            Self::Copy => copy_file(from, to),
            Self::Move => move_file(from, to),
        }
    }

    fn undo(self, from: &Path, to: &Path) -> dm_store::Result<()> {
        match self {
            Self::Copy => remove_file(to),
            Self::Move => move_file(to, from),
        }
    }

    /// Carry every file into `dest`, or none of them.
    ///
    /// Every destination is checked before a file is touched. A failure
    /// partway through puts the files already carried back where they were.
    fn run(self, files: &[PathBuf], dest: &Path) -> std::result::Result<(), String> {
        let targets: Vec<PathBuf> = files
            .iter()
            .map(|file| dest.join(file_name_of(file)))
            .collect();
        for target in &targets {
            ensure_vacant(target).map_err(|e| e.to_string())?;
        }
        let created = !dest.is_dir();
        fs::create_dir_all(dest)
            .map_err(|e| format!("Failed to create directory {}: {e}", dest.display()))?;

        for (index, (file, target)) in files.iter().zip(&targets).enumerate() {
            let Err(e) = self.apply(file, target) else {
                continue;
            };
            warn!(file = %file.display(), "transfer interrupted, rolling back");
            for (done, done_target) in files[..index].iter().zip(&targets[..index]).rev() {
                if let Err(undo) = self.undo(done, done_target) {
                    error!(file = %done_target.display(), error = %undo, "rollback failed");
                }
            }
            if created {
                // only succeeds when the rollback left it empty
                let _ = fs::remove_dir(dest);
            }
            return Err(e.to_string());
        }
        Ok(())
    }
}

/// Run one QA cycle over `layout`.
pub fn run_qa_cycle(
    layout: &DatasetLayout,
    dictionary: &DataDictionary,
    ctx: &RunContext,
    legacy_exceptions: bool,
) -> Result<QaCycleReport> {
    QaLifecycle::new(layout, dictionary, legacy_exceptions).run_cycle(ctx)
}
