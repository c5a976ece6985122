//! Validation engine.
//!
//! A validation pass walks every group directory of one tree and checks
//! each group on its own: naming, folder agreement, exception files,
//! combination rows, presence against the dictionary, empty files and
//! datatype content checks. Every problem becomes an [`ErrorRecord`];
//! nothing short-circuits.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use dm_dictionary::DataDictionary;
use dm_model::{
    DictionaryRow, Identifier, Issue, IssueCategory, ParsedFileName, PendingEntry, PendingError,
    RunContext, VariableKind,
};
use dm_store::{DatasetLayout, is_empty_file, list_files_sorted};
use tracing::{debug, error, info, info_span};

use crate::content::{ContentInput, ContentRegistry};
use crate::discovery::{Group, Stage, discover_groups, relative_path};
use crate::error::Result;
use crate::resolver::{FileClass, Resolver};

/// One validation problem, attributed to an identifier when it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub identifier: Option<Identifier>,
    /// `identifierDetails` text, or the group path for unattributed problems.
    pub details: String,
    pub issue: Issue,
}

impl ErrorRecord {
    pub fn error_type(&self) -> &'static str {
        self.issue.error_type()
    }

    pub fn error_details(&self) -> String {
        self.issue.details()
    }

    pub fn identifier_text(&self) -> String {
        self.identifier
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

/// What a pass learned about one identifier besides its errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierOutcome {
    pub datatype: String,
    pub details: String,
    pub deviation: bool,
    pub no_data: bool,
    /// Every expected file name is present.
    pub complete: bool,
}

/// Result of validating a single group directory.
#[derive(Debug, Clone, Default)]
pub struct GroupReport {
    pub outcomes: BTreeMap<Identifier, IdentifierOutcome>,
    pub records: Vec<ErrorRecord>,
}

/// Result of a validation pass over one tree.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    stage: Stage,
    groups: usize,
    outcomes: BTreeMap<Identifier, IdentifierOutcome>,
    records: Vec<ErrorRecord>,
}

impl ValidationReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            groups: 0,
            outcomes: BTreeMap::new(),
            records: Vec::new(),
        }
    }

    fn merge(&mut self, group: GroupReport) {
        self.groups += 1;
        for (identifier, outcome) in group.outcomes {
            self.outcomes.entry(identifier).or_insert(outcome);
        }
        self.records.extend(group.records);
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Number of non-empty group directories inspected.
    pub fn group_count(&self) -> usize {
        self.groups
    }

    /// Identifiers seen in the tree or expected by the dictionary.
    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.outcomes.keys()
    }

    pub fn outcome(&self, identifier: &Identifier) -> Option<&IdentifierOutcome> {
        self.outcomes.get(identifier)
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn errors_for<'a>(
        &'a self,
        identifier: &'a Identifier,
    ) -> impl Iterator<Item = &'a ErrorRecord> + 'a {
        self.records
            .iter()
            .filter(move |record| record.identifier.as_ref() == Some(identifier))
    }

    /// Identifiers without any error.
    pub fn passed(&self) -> impl Iterator<Item = &Identifier> {
        let failed = self.failed_identifiers();
        self.outcomes
            .keys()
            .filter(move |identifier| !failed.contains(identifier))
    }

    pub fn is_clean(&self) -> bool {
        self.records.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.records.len()
    }

    pub fn count_by_category(&self) -> BTreeMap<IssueCategory, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.issue.category()).or_insert(0) += 1;
        }
        counts
    }

    fn failed_identifiers(&self) -> BTreeSet<Identifier> {
        self.records
            .iter()
            .filter_map(|record| record.identifier.clone())
            .collect()
    }

    /// Rows of a `pending-files` snapshot: a pass row for each clean
    /// identifier, one row per error otherwise.
    pub fn pending_entries(&self, ctx: &RunContext) -> Vec<PendingEntry> {
        let mut by_identifier: BTreeMap<&Identifier, Vec<&ErrorRecord>> = BTreeMap::new();
        let mut unattributed = Vec::new();
        for record in &self.records {
            match &record.identifier {
                Some(identifier) => by_identifier.entry(identifier).or_default().push(record),
                None => unattributed.push(record),
            }
        }

        let mut rows = Vec::new();
        for (identifier, outcome) in &self.outcomes {
            if by_identifier.contains_key(identifier) {
                continue;
            }
            rows.push(PendingEntry {
                datetime: ctx.timestamp().to_string(),
                user: ctx.user().to_string(),
                pass_raw: true,
                identifier: identifier.to_string(),
                identifier_details: outcome.details.clone(),
                error_type: String::new(),
                error_details: String::new(),
            });
        }
        for record in by_identifier.into_values().flatten().chain(unattributed) {
            rows.push(failed_entry(ctx, record));
        }
        rows
    }

    /// Rows of a `pending-errors` snapshot.
    pub fn pending_errors(&self, ctx: &RunContext) -> Vec<PendingError> {
        self.records
            .iter()
            .map(|record| PendingError::from(&failed_entry(ctx, record)))
            .collect()
    }

    /// Write the snapshots for this stage. Raw passes write both tables
    /// under one timestamp; checked passes only write errors.
    pub fn write_snapshots(&self, layout: &DatasetLayout, ctx: &RunContext) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        if self.stage == Stage::Raw {
            written.extend(dm_store::write_pending_files(
                layout,
                ctx,
                &self.pending_entries(ctx),
            )?);
        }
        written.extend(dm_store::write_pending_errors(
            layout,
            ctx,
            &self.pending_errors(ctx),
        )?);
        Ok(written)
    }
}

fn failed_entry(ctx: &RunContext, record: &ErrorRecord) -> PendingEntry {
    PendingEntry {
        datetime: ctx.timestamp().to_string(),
        user: ctx.user().to_string(),
        pass_raw: false,
        identifier: record.identifier_text(),
        identifier_details: record.details.clone(),
        error_type: record.error_type().to_string(),
        error_details: record.error_details(),
    }
}

/// A directory entry with its name-based classification.
struct GroupFile {
    name: String,
    path: PathBuf,
    class: FileClass,
    empty: bool,
}

/// Exception files found in one group.
#[derive(Default)]
struct Exceptions {
    deviations: BTreeSet<Identifier>,
    no_data: BTreeSet<Identifier>,
    group_deviation: bool,
    group_no_data: bool,
}

impl Exceptions {
    fn covers(&self, identifier: &Identifier) -> bool {
        self.group_deviation
            || self
                .deviations
                .iter()
                .any(|d| d.variable == identifier.variable && d.suffix == identifier.suffix)
    }

    fn is_no_data(&self, identifier: &Identifier) -> bool {
        self.group_no_data || self.no_data.contains(identifier)
    }

    fn is_deviation(&self, identifier: &Identifier) -> bool {
        self.group_deviation || self.deviations.contains(identifier)
    }

    fn any_deviation(&self) -> bool {
        self.group_deviation || !self.deviations.is_empty()
    }
}

/// Expected identifiers after combination rows are reduced.
struct Expectations<'d> {
    identifiers: Vec<(Identifier, &'d DictionaryRow)>,
    /// Members of combination rows with more than one member present.
    conflicted: BTreeSet<Identifier>,
}

impl Expectations<'_> {
    fn row_for(&self, identifier: &Identifier) -> Option<&DictionaryRow> {
        self.identifiers
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, row)| *row)
    }
}

/// Validates group directories against a data dictionary.
#[derive(Debug)]
pub struct ValidationEngine<'a> {
    dictionary: &'a DataDictionary,
    resolver: Resolver<'a>,
    content: ContentRegistry,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(dictionary: &'a DataDictionary, legacy_exceptions: bool) -> Self {
        Self {
            dictionary,
            resolver: Resolver::new(dictionary, legacy_exceptions),
            content: ContentRegistry::default(),
        }
    }

    pub fn with_content(mut self, content: ContentRegistry) -> Self {
        self.content = content;
        self
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    /// Validate every group directory of `stage`.
    pub fn validate(&self, layout: &DatasetLayout, stage: Stage) -> Result<ValidationReport> {
        let span = info_span!("validate", stage = %stage, dataset = %layout.dataset_name());
        let _guard = span.enter();

        let mut report = ValidationReport::new(stage);
        for group in discover_groups(layout, stage)? {
            let group_report = self.validate_group(layout, &group)?;
            for record in &group_report.records {
                error!(
                    identifier = %record.identifier_text(),
                    details = %record.details,
                    error_type = record.error_type(),
                    "{}",
                    record.error_details()
                );
            }
            report.merge(group_report);
        }
        info!(
            groups = report.group_count(),
            identifiers = report.outcomes.len(),
            errors = report.error_count(),
            "validation finished"
        );
        Ok(report)
    }

    /// Validate one group directory.
    pub fn validate_group(&self, layout: &DatasetLayout, group: &Group) -> Result<GroupReport> {
        let mut report = GroupReport::default();
        let mut files = Vec::new();
        for path in list_files_sorted(&group.dir)? {
            let name = dm_store::file_name_of(&path);
            files.push(GroupFile {
                class: self.resolver.classify(&name),
                empty: is_empty_file(&path)?,
                name,
                path,
            });
        }
        if files.is_empty() {
            debug!(group = %group.relative, "skipping empty group directory");
            return Ok(report);
        }

        let mut push = |identifier: Option<&Identifier>, issue: Issue| {
            let details = match identifier {
                Some(id) => self.details(id, group),
                None => group.relative.clone(),
            };
            report.records.push(ErrorRecord {
                identifier: identifier.cloned(),
                details,
                issue,
            });
        };

        // Naming, folder agreement and exception bookkeeping.
        let mut exceptions = Exceptions::default();
        for file in &files {
            match &file.class {
                FileClass::Data(parsed) => {
                    let id = &parsed.identifier;
                    for issue in self.resolver.check_file(parsed, &file.name) {
                        push(Some(id), issue);
                    }
                    if self.is_misplaced(id, group) {
                        push(
                            Some(id),
                            Issue::MisplacedFile {
                                file: file.name.clone(),
                                directory: group.relative.clone(),
                            },
                        );
                    }
                }
                FileClass::Deviation(id) => {
                    for issue in self.resolver.check_identifier(id, &file.name) {
                        push(Some(id), issue);
                    }
                    exceptions.deviations.insert(id.clone());
                }
                FileClass::NoData(id) => {
                    for issue in self.resolver.check_identifier(id, &file.name) {
                        push(Some(id), issue);
                    }
                    exceptions.no_data.insert(id.clone());
                }
                FileClass::GroupDeviation => exceptions.group_deviation = true,
                FileClass::GroupNoData => exceptions.group_no_data = true,
                FileClass::IssueFile => {
                    push(None, Issue::IssueFile);
                    push(
                        None,
                        Issue::UnexpectedFile {
                            file: file.name.clone(),
                        },
                    );
                }
                FileClass::Unparsed => push(
                    None,
                    Issue::UnmatchedName {
                        file: file.name.clone(),
                    },
                ),
            }
        }

        let data_ids: BTreeSet<&Identifier> = files
            .iter()
            .filter_map(|file| match &file.class {
                FileClass::Data(parsed) => Some(&parsed.identifier),
                _ => None,
            })
            .collect();

        // Improper exception combinations.
        for id in exceptions.deviations.intersection(&exceptions.no_data) {
            push(Some(id), Issue::DeviationWithNoData);
        }
        if exceptions.group_deviation && exceptions.group_no_data {
            push(None, Issue::DeviationWithNoData);
        }
        for id in exceptions.deviations.difference(&exceptions.no_data) {
            let covered = data_ids
                .iter()
                .any(|d| d.variable == id.variable && d.suffix == id.suffix);
            if !covered {
                push(Some(id), Issue::LoneDeviation);
            }
        }
        if exceptions.group_deviation
            && !exceptions.group_no_data
            && files.iter().all(|file| file.class.is_exception())
        {
            push(None, Issue::LoneDeviation);
        }

        // Expected identifiers, with combination rows reduced.
        let expectations = self.expectations(group, &data_ids, &exceptions, &mut push);

        // Missing files.
        let names: BTreeSet<&str> = files.iter().map(|file| file.name.as_str()).collect();
        for (id, row) in &expectations.identifiers {
            let exempt = exceptions.is_deviation(id) || exceptions.is_no_data(id);
            let mut complete = true;
            for extension in &row.expected_extensions {
                let expected = id.file_name(extension);
                if !names.contains(expected.as_str()) {
                    complete = false;
                    if !exempt {
                        push(Some(id), Issue::MissingFile { file: expected });
                    }
                }
            }
            report.outcomes.insert(
                id.clone(),
                IdentifierOutcome {
                    datatype: group.datatype.clone(),
                    details: self.details(id, group),
                    deviation: exceptions.is_deviation(id),
                    no_data: exceptions.is_no_data(id),
                    complete,
                },
            );
        }

        // Files nothing explains.
        for file in &files {
            let unexpected_id = match &file.class {
                FileClass::Data(parsed) => {
                    let id = &parsed.identifier;
                    let explained = if exceptions.is_no_data(id) {
                        false
                    } else if exceptions.covers(id) {
                        true
                    } else if expectations.conflicted.contains(id) {
                        false
                    } else {
                        expectations.row_for(id).is_some_and(|row| {
                            row.expected_extensions
                                .iter()
                                .any(|ext| id.file_name(ext) == file.name)
                        })
                    };
                    if explained {
                        continue;
                    }
                    Some(id)
                }
                FileClass::Deviation(id) if exceptions.no_data.contains(id) => Some(id),
                FileClass::GroupDeviation if exceptions.group_no_data => None,
                FileClass::Unparsed if !exceptions.any_deviation() => None,
                _ => continue,
            };
            push(
                unexpected_id,
                Issue::UnexpectedFile {
                    file: file.name.clone(),
                },
            );
        }

        // Empty files and content checks.
        let content = self.content.get(&group.datatype);
        for file in &files {
            let FileClass::Data(parsed) = &file.class else {
                continue;
            };
            let id = &parsed.identifier;
            if file.empty {
                let path = relative_path(layout.root(), &file.path);
                let no_data = content.and_then(|check| check.empty_file(&path));
                push(Some(id), Issue::EmptyFile { path });
                if let Some(issue) = no_data {
                    push(Some(id), issue);
                }
                continue;
            }
            let Some(check) = content else {
                continue;
            };
            if !self.wants_content_check(parsed, &file.name, &expectations, &exceptions) {
                continue;
            }
            let issues = check.check(&ContentInput {
                identifier: id,
                extension: &parsed.extension,
                path: &file.path,
            })?;
            for issue in issues {
                push(Some(id), issue);
            }
        }

        // Identifiers that appeared without being expected still count as processed.
        let seen = data_ids
            .iter()
            .copied()
            .chain(&exceptions.deviations)
            .chain(&exceptions.no_data);
        for id in seen {
            if report.outcomes.contains_key(id) {
                continue;
            }
            let outcome = IdentifierOutcome {
                datatype: self.datatype_of(id, group),
                details: self.details(id, group),
                deviation: exceptions.is_deviation(id),
                no_data: exceptions.is_no_data(id),
                complete: false,
            };
            report.outcomes.insert(id.clone(), outcome);
        }

        Ok(report)
    }

    fn expectations<F>(
        &self,
        group: &Group,
        data_ids: &BTreeSet<&Identifier>,
        exceptions: &Exceptions,
        push: &mut F,
    ) -> Expectations<'a>
    where
        F: FnMut(Option<&Identifier>, Issue),
    {
        let dictionary: &'a DataDictionary = self.dictionary;
        let mut expectations = Expectations {
            identifiers: Vec::new(),
            conflicted: BTreeSet::new(),
        };
        let mut reduced = BTreeSet::new();
        let rows = dictionary.rows().iter().filter(|row| {
            matches!(&row.kind, VariableKind::Direct { datatype, .. } if *datatype == group.datatype)
        });
        for row in rows {
            for suffix in &row.allowed_suffixes {
                if suffix.session_run() != group.session_run {
                    continue;
                }
                let id = Identifier::new(group.subject.clone(), row.variable.clone(), *suffix);
                let Some(combination) = dictionary.combination_of(&row.variable) else {
                    expectations.identifiers.push((id, row));
                    continue;
                };
                if !reduced.insert((combination.variable.clone(), *suffix)) {
                    continue;
                }

                let present: Vec<(Identifier, &DictionaryRow)> = combination
                    .kind
                    .members()
                    .iter()
                    .filter_map(|member| dictionary.get(member))
                    .filter(|member| member.allowed_suffixes.contains(suffix))
                    .map(|member| {
                        (
                            Identifier::new(group.subject.clone(), member.variable.clone(), *suffix),
                            member,
                        )
                    })
                    .filter(|(member_id, _)| {
                        data_ids.contains(member_id) || exceptions.no_data.contains(member_id)
                    })
                    .collect();
                let combination_id =
                    Identifier::new(group.subject.clone(), combination.variable.clone(), *suffix);
                match present.len() {
                    0 if exceptions.group_no_data => {}
                    0 => push(
                        Some(&combination_id),
                        Issue::CombinationEmpty {
                            row: combination.variable.clone(),
                        },
                    ),
                    1 => expectations.identifiers.extend(present),
                    _ => {
                        push(
                            Some(&combination_id),
                            Issue::CombinationConflict {
                                row: combination.variable.clone(),
                            },
                        );
                        for (member_id, member) in present {
                            expectations.conflicted.insert(member_id.clone());
                            expectations.identifiers.push((member_id, member));
                        }
                    }
                }
            }
        }
        expectations
    }

    fn wants_content_check(
        &self,
        parsed: &ParsedFileName,
        file_name: &str,
        expectations: &Expectations<'_>,
        exceptions: &Exceptions,
    ) -> bool {
        let id = &parsed.identifier;
        parsed.is_canonical()
            && !exceptions.is_no_data(id)
            && expectations.row_for(id).is_some_and(|row| {
                row.expected_extensions
                    .iter()
                    .any(|ext| id.file_name(ext) == file_name)
            })
    }

    fn is_misplaced(&self, id: &Identifier, group: &Group) -> bool {
        let datatype_mismatch = match self.dictionary.get(&id.variable).map(|row| &row.kind) {
            Some(VariableKind::Direct { datatype, .. }) => datatype != &group.datatype,
            _ => false,
        };
        id.subject != group.subject || id.session_run() != group.session_run || datatype_mismatch
    }

    fn datatype_of(&self, id: &Identifier, group: &Group) -> String {
        match self.dictionary.get(&id.variable).map(|row| &row.kind) {
            Some(VariableKind::Direct { datatype, .. }) => datatype.clone(),
            _ => group.datatype.clone(),
        }
    }

    fn details(&self, id: &Identifier, group: &Group) -> String {
        id.detailed(
            &self.datatype_of(id, group),
            self.dictionary.is_combination_member(&id.variable),
        )
    }
}
