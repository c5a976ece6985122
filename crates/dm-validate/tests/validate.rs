//! Validation of generated datasets.

use std::fs;

use dm_dictionary::DataDictionary;
use dm_model::{Identifier, RunContext};
use dm_store::fixture::{DatasetFixture, FixtureContext, FixtureFiles, raw_path};
use dm_store::{SnapshotKind, list_snapshots, read_table};
use dm_validate::{Stage, ValidationEngine, ValidationReport};

fn validate(fixture: &DatasetFixture, stage: Stage, legacy: bool) -> ValidationReport {
    let dictionary =
        DataDictionary::load(&fixture.layout().datadict_path()).expect("load dictionary");
    ValidationEngine::new(&dictionary, legacy)
        .validate(fixture.layout(), stage)
        .expect("validate")
}

fn raw_errors(fixture: &DatasetFixture) -> Vec<(String, String)> {
    errors_of(&validate(fixture, Stage::Raw, false))
}

fn errors_of(report: &ValidationReport) -> Vec<(String, String)> {
    let mut errors: Vec<_> = report
        .records()
        .iter()
        .map(|r| (r.error_type().to_string(), r.error_details()))
        .collect();
    errors.sort();
    errors
}

fn count(errors: &[(String, String)], error_type: &str) -> usize {
    errors.iter().filter(|(t, _)| t == error_type).count()
}

fn psychopy_id(sub: &str, variable: &str) -> String {
    format!("sub-{sub}_{variable}_s1_r1_e1")
}

fn psychopy_path(sub: &str, file: &str) -> String {
    raw_path("s1_r1", "psychopy", sub, file)
}

fn add_deviation(files: &mut FixtureFiles, sub: &str) {
    let id = psychopy_id(sub, "arrow-alert-v1-1_psychopy");
    files.insert(psychopy_path(sub, &format!("{id}-deviation.txt")), "reason");
}

#[test]
fn base_dataset_is_clean_in_both_trees() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |_, _| {}).expect("fixture");

    let raw = validate(&fixture, Stage::Raw, false);
    assert!(raw.is_clean(), "unexpected errors: {:?}", errors_of(&raw));
    // psychopy, eeg, audacity, zoom and digi in each of three sessions
    assert_eq!(raw.identifiers().count(), 15);
    assert_eq!(raw.passed().count(), 15);
    assert_eq!(raw.group_count(), 15);

    let checked = validate(&fixture, Stage::Checked, false);
    assert!(checked.is_clean(), "unexpected errors: {:?}", errors_of(&checked));
    let id: Identifier = format!("sub-{}_all_eeg_s2_r1_e1", fixture.subject())
        .parse()
        .expect("identifier");
    let outcome = checked.outcome(&id).expect("eeg outcome");
    assert!(outcome.complete);
    assert!(!outcome.deviation && !outcome.no_data);
}

#[test]
fn missing_expected_file() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let name = format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy"));
        files.remove(&psychopy_path(sub, &name)).expect("base csv");
    })
    .expect("fixture");

    let sub = fixture.subject();
    assert_eq!(
        raw_errors(&fixture),
        vec![(
            "Missing file".to_string(),
            format!("Expected file sub-{sub}_arrow-alert-v1-1_psychopy_s1_r1_e1.csv not found"),
        )]
    );
}

#[test]
fn extra_encounter_is_naming_error_and_unexpected() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let base = psychopy_path(sub, &format!("sub-{sub}_arrow-alert-v1-1_psychopy_s1_r1_e1.csv"));
        let contents = files.get(&base).expect("base csv").clone();
        files.insert(base.replace("s1_r1_e1", "s1_r1_e2"), contents);
    })
    .expect("fixture");

    let sub = fixture.subject();
    let errors = raw_errors(&fixture);
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors.contains(&(
        "Naming error".to_string(),
        "Suffix s1_r1_e2 not in allowed suffixes [s1_r1_e1, s2_r1_e1, s3_r1_e1]".to_string(),
    )));
    assert!(errors.contains(&(
        "Unexpected file".to_string(),
        format!("Unexpected file sub-{sub}_arrow-alert-v1-1_psychopy_s1_r1_e2.csv found"),
    )));
}

#[test]
fn empty_file_reports_empty_and_no_data() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let path = psychopy_path(sub, &format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy")));
        files.insert(path, "");
    })
    .expect("fixture");

    let sub = fixture.subject();
    let path = format!(
        "sourcedata/raw/s1_r1/psychopy/sub-{sub}/sub-{sub}_arrow-alert-v1-1_psychopy_s1_r1_e1.csv"
    );
    assert_eq!(
        raw_errors(&fixture),
        vec![
            ("Empty file".to_string(), format!("Found empty file {path}")),
            ("Psychopy error".to_string(), format!("No data found in {path}")),
        ]
    );
}

#[test]
fn multiple_combination_members_conflict() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let existing = psychopy_path(sub, &format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy")));
        let duplicate = psychopy_path(sub, &format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-2_psychopy")));
        let contents = files.get(&existing).expect("base csv").clone();
        files.insert(duplicate, contents);
    })
    .expect("fixture");

    let sub = fixture.subject();
    let errors = raw_errors(&fixture);
    assert_eq!(count(&errors, "Combination variable error"), 1);
    assert!(errors.contains(&(
        "Combination variable error".to_string(),
        "Multiple variables present for combination row arrow-alert_psychopy, expected one."
            .to_string(),
    )));
    let v1_2 = psychopy_id(sub, "arrow-alert-v1-2_psychopy");
    let missing: Vec<_> = errors
        .iter()
        .filter(|(t, _)| t == "Missing file")
        .map(|(_, d)| d.clone())
        .collect();
    assert_eq!(
        missing,
        vec![
            format!("Expected file {v1_2}.log not found"),
            format!("Expected file {v1_2}.psydat not found"),
        ]
    );
    let unexpected = errors.iter().filter(|(t, _)| t == "Unexpected file");
    let v1_1 = psychopy_id(sub, "arrow-alert-v1-1_psychopy");
    assert_eq!(unexpected.clone().filter(|(_, d)| d.contains(&v1_1)).count(), 3);
    assert_eq!(unexpected.filter(|(_, d)| d.contains(&v1_2)).count(), 1);
    assert_eq!(errors.len(), 7);
}

#[test]
fn lone_deviation_is_improper_and_empties_combination() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        files.remove_dir(&format!("sourcedata/raw/s1_r1/psychopy/sub-{sub}"));
        add_deviation(files, sub);
    })
    .expect("fixture");

    assert_eq!(
        raw_errors(&fixture),
        vec![
            (
                "Combination variable error".to_string(),
                "Combination row arrow-alert_psychopy has no variables present.".to_string(),
            ),
            (
                "Improper exception files".to_string(),
                "deviation.txt cannot signify only 1 file; use no-data.txt.".to_string(),
            ),
        ]
    );
}

#[test]
fn deviation_and_no_data_together() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        add_deviation(files, sub);
        let id = psychopy_id(sub, "arrow-alert-v1-1_psychopy");
        files.insert(psychopy_path(sub, &format!("{id}-no-data.txt")), "no data");
    })
    .expect("fixture");

    let errors = raw_errors(&fixture);
    assert_eq!(count(&errors, "Improper exception files"), 1);
    assert!(errors.contains(&(
        "Improper exception files".to_string(),
        "Both deviation and no-data files present for identifier".to_string(),
    )));
    assert_eq!(count(&errors, "Unexpected file"), 4);
    assert_eq!(errors.len(), 5);
}

#[test]
fn deviation_covers_misplaced_subject_but_not_the_report() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        add_deviation(files, sub);
        let other: u64 = sub.parse::<u64>().expect("numeric subject") + 1;
        let old = format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy"));
        let new = old.replace(sub, &other.to_string());
        assert!(files.rename(&psychopy_path(sub, &old), psychopy_path(sub, &new)));
    })
    .expect("fixture");

    let sub = fixture.subject();
    let errors = raw_errors(&fixture);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].0, "Misplaced file");
    assert!(
        errors[0]
            .1
            .ends_with(&format!("found in sourcedata/raw/s1_r1/psychopy/sub-{sub}/"))
    );
}

#[test]
fn deviation_allows_extra_info_files() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        add_deviation(files, sub);
        let base = psychopy_path(sub, &format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy")));
        let contents = files.get(&base).expect("base csv").clone();
        files.insert(base.replace(".csv", "_extra.csv"), contents);
    })
    .expect("fixture");

    let report = validate(&fixture, Stage::Raw, false);
    assert!(report.is_clean(), "{:?}", errors_of(&report));
    let id: Identifier = psychopy_id(fixture.subject(), "arrow-alert-v1-1_psychopy")
        .parse()
        .expect("identifier");
    assert!(report.outcome(&id).expect("outcome").deviation);
}

#[test]
fn deviation_keeps_naming_errors() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        add_deviation(files, sub);
        let old = format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy"));
        assert!(files.rename(&psychopy_path(sub, &old), psychopy_path(sub, "badfilename.csv")));
    })
    .expect("fixture");

    assert_eq!(
        raw_errors(&fixture),
        vec![(
            "Naming error".to_string(),
            "File badfilename.csv does not match expected identifier format".to_string(),
        )]
    );
}

#[test]
fn unparsed_file_without_deviation_is_also_unexpected() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let old = format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy"));
        assert!(files.rename(&psychopy_path(sub, &old), psychopy_path(sub, "badfilename.csv")));
    })
    .expect("fixture");

    let errors = raw_errors(&fixture);
    assert_eq!(count(&errors, "Naming error"), 1);
    assert_eq!(count(&errors, "Unexpected file"), 1);
    assert_eq!(count(&errors, "Missing file"), 1);
    let report = validate(&fixture, Stage::Raw, false);
    let unattributed = report.records().iter().find(|r| r.identifier.is_none()).expect("record");
    assert_eq!(
        unattributed.details,
        format!("sourcedata/raw/s1_r1/psychopy/sub-{}", fixture.subject())
    );
}

#[test]
fn no_data_with_remaining_files() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let id = psychopy_id(sub, "arrow-alert-v1-1_psychopy");
        files.insert(psychopy_path(sub, &format!("{id}-no-data.txt")), "no data");
    })
    .expect("fixture");

    let errors = raw_errors(&fixture);
    assert_eq!(errors.len(), 3);
    assert_eq!(count(&errors, "Unexpected file"), 3);
}

#[test]
fn no_data_alone_passes() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        files.remove_dir(&format!("sourcedata/raw/s1_r1/psychopy/sub-{sub}"));
        let id = psychopy_id(sub, "arrow-alert-v1-1_psychopy");
        files.insert(psychopy_path(sub, &format!("{id}-no-data.txt")), "no data");
    })
    .expect("fixture");

    let report = validate(&fixture, Stage::Raw, false);
    assert!(report.is_clean(), "{:?}", errors_of(&report));
    let id: Identifier = psychopy_id(fixture.subject(), "arrow-alert-v1-1_psychopy")
        .parse()
        .expect("identifier");
    let outcome = report.outcome(&id).expect("outcome");
    assert!(outcome.no_data);
    assert!(!outcome.complete);
}

#[test]
fn issue_file_is_reported_and_unexpected() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        files.insert(psychopy_path(sub, "issue.txt"), "Generic issue message");
    })
    .expect("fixture");

    assert_eq!(
        raw_errors(&fixture),
        vec![
            (
                "Issue file".to_string(),
                "Found issue.txt in identifier's directory".to_string(),
            ),
            (
                "Unexpected file".to_string(),
                "Unexpected file issue.txt found".to_string(),
            ),
        ]
    );
}

#[test]
fn session_mismatch_is_misplaced_missing_and_unexpected() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let old = format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy"));
        let new = old.replace("s1_r1_e1", "s3_r1_e1");
        assert!(files.rename(&psychopy_path(sub, &old), psychopy_path(sub, &new)));
    })
    .expect("fixture");

    let errors = raw_errors(&fixture);
    assert_eq!(count(&errors, "Misplaced file"), 1);
    assert_eq!(count(&errors, "Missing file"), 1);
    assert_eq!(count(&errors, "Unexpected file"), 1);
    assert_eq!(errors.len(), 3);
}

#[test]
fn datatype_mismatch_is_misplaced() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let name = format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy"));
        let contents = files.get(&psychopy_path(sub, &name)).expect("base csv").clone();
        files.insert(raw_path("s1_r1", "digi", sub, &name), contents);
    })
    .expect("fixture");

    let errors = raw_errors(&fixture);
    assert_eq!(count(&errors, "Misplaced file"), 1);
    assert_eq!(count(&errors, "Unexpected file"), 1);
    assert_eq!(errors.len(), 2);
}

#[test]
fn psychopy_csv_id_mismatch() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let path = psychopy_path(sub, &format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy")));
        let contents = files.get(&path).expect("base csv").replacen(sub, "3000000", 1);
        files.insert(path, contents);
    })
    .expect("fixture");

    let sub = fixture.subject();
    assert_eq!(
        raw_errors(&fixture),
        vec![(
            "Psychopy error".to_string(),
            format!("ID value(s) [3000000] in csvfile different from ID in filename ({sub})"),
        )]
    );
}

#[test]
fn eeg_marker_reference_mismatch() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let name = format!("sub-{sub}_all_eeg_s1_r1_e1.vhdr");
        let path = raw_path("s1_r1", "eeg", sub, &name);
        let contents = files
            .get(&path)
            .expect("base vhdr")
            .replace("MarkerFile=", "MarkerFile=other_");
        files.insert(path, contents);
    })
    .expect("fixture");

    let sub = fixture.subject();
    assert_eq!(
        raw_errors(&fixture),
        vec![(
            "EEG error".to_string(),
            format!(
                "Incorrect MarkerFile other_sub-{sub}_all_eeg_s1_r1_e1.vmrk in .vhdr file, expected sub-{sub}_all_eeg_s1_r1_e1.vmrk"
            ),
        )]
    );
}

#[test]
fn bare_exception_files_need_legacy_mode() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let old = format!("{}.csv", psychopy_id(sub, "arrow-alert-v1-1_psychopy"));
        files.remove(&psychopy_path(sub, &old)).expect("base csv");
        files.insert(psychopy_path(sub, "deviation.txt"), "lost the csv");
    })
    .expect("fixture");

    let strict = errors_of(&validate(&fixture, Stage::Raw, false));
    assert_eq!(count(&strict, "Naming error"), 1);
    assert_eq!(count(&strict, "Unexpected file"), 1);
    assert_eq!(count(&strict, "Missing file"), 1);

    let legacy = validate(&fixture, Stage::Raw, true);
    assert!(legacy.is_clean(), "{:?}", errors_of(&legacy));
}

#[test]
fn raw_snapshots_share_a_timestamp() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, sub| {
        let name = format!("sub-{sub}_all_eeg_s2_r1_e1.vmrk");
        files.remove(&raw_path("s2_r1", "eeg", sub, &name)).expect("marker file");
    })
    .expect("fixture");
    let layout = fixture.layout();
    let run = RunContext::new("2024-05-01_10-30", "tester");

    let report = validate(&fixture, Stage::Raw, false);
    let written = report.write_snapshots(layout, &run).expect("write snapshots");
    assert_eq!(written.len(), 2);

    let files = list_snapshots(layout, SnapshotKind::Files).expect("list files");
    let errors = list_snapshots(layout, SnapshotKind::Errors).expect("list errors");
    assert_eq!(files.len(), 1);
    assert_eq!(errors.len(), 1);
    assert_eq!(files[0].0, errors[0].0);

    let rows: Vec<dm_model::PendingEntry> = read_table(&files[0].1).expect("read pending files");
    assert_eq!(rows.iter().filter(|r| r.pass_raw).count(), 14);
    let failed: Vec<_> = rows.iter().filter(|r| !r.pass_raw).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_type, "Missing file");
    assert_eq!(
        failed[0].identifier_details,
        format!("sub-{}/all_eeg/s2_r1_e1 (eeg)", fixture.subject())
    );
    let sorted: Vec<_> = rows.iter().map(|r| r.identifier.clone()).collect();
    let mut expected = sorted.clone();
    expected.sort();
    assert_eq!(sorted, expected);

    // A second write at the same timestamp is skipped.
    assert!(report.write_snapshots(layout, &run).expect("rewrite").is_empty());

    let checked = validate(&fixture, Stage::Checked, false);
    let later = RunContext::new("2024-05-01_10-31", "tester");
    let written = checked.write_snapshots(layout, &later).expect("write checked");
    assert_eq!(written.len(), 1);
    assert!(fs::read_to_string(&written[0]).expect("read").starts_with("datetime,user,identifier"));
}
