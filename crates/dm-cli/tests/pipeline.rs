//! Entry points over generated datasets.

use std::fs;

use dm_cli::pipeline::{
    RunOptions, Scope, run_all, run_qa_cycle, run_raw_validation, run_tracker_update,
};
use dm_model::RunContext;
use dm_store::fixture::{DatasetFixture, FixtureContext, raw_path};
use dm_store::{SnapshotKind, list_snapshots, load_or_create_checklist};

fn ctx(timestamp: &str) -> RunContext {
    RunContext::new(timestamp, "monitor")
}

#[test]
fn full_run_on_clean_dataset() {
    let mut fixtures = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut fixtures, |_, _| {}).expect("fixture");
    let layout = fixture.layout();

    let summary = run_all(&fixture.root(), &RunOptions::default(), &ctx("2024-03-01_10-00"))
        .expect("run");

    assert!(!summary.has_errors());
    assert!(summary.validation.raw.is_some());
    assert!(summary.validation.checked.is_some());
    assert_eq!(summary.validation.snapshots.len(), 2);
    let qa = summary.qa.as_ref().expect("qa ran");
    assert_eq!(qa.staged.len(), 15);
    assert_eq!(load_or_create_checklist(layout).expect("checklist").len(), 15);
    assert_eq!(summary.tracker.as_ref().expect("tracker").len(), 1);
    assert!(layout.tracker_path().is_file());
}

#[test]
fn raw_and_checked_errors_share_one_snapshot() {
    let mut fixtures = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut fixtures, |files, sub| {
        files.insert(raw_path("s1_r1", "eeg", sub, "stray.txt"), "stray");
        files.insert(
            format!("sourcedata/checked/sub-{sub}/s2_r1/eeg/stray.txt"),
            "stray",
        );
    })
    .expect("fixture");
    let layout = fixture.layout();

    let summary = run_raw_validation(
        &fixture.root(),
        &RunOptions::default(),
        &ctx("2024-03-01_10-00"),
    )
    .expect("validate");
    assert!(summary.raw.as_ref().expect("raw").error_count() > 0);
    assert!(summary.checked.as_ref().expect("checked").error_count() > 0);

    let errors = list_snapshots(layout, SnapshotKind::Errors).expect("list");
    assert_eq!(errors.len(), 1);
    let contents = fs::read_to_string(&errors[0].1).expect("read snapshot");
    assert!(contents.contains("sourcedata/raw/s1_r1/eeg"));
    assert!(contents.contains(&format!("sourcedata/checked/sub-{}/s2_r1/eeg", fixture.subject())));
}

#[test]
fn raw_only_skips_checked_tree() {
    let mut fixtures = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut fixtures, |_, _| {}).expect("fixture");
    let options = RunOptions {
        scope: Scope::RawOnly,
        ..RunOptions::default()
    };
    let summary = run_raw_validation(&fixture.root(), &options, &ctx("2024-03-01_10-00"))
        .expect("validate");
    assert!(summary.raw.is_some());
    assert!(summary.checked.is_none());
}

#[test]
fn checked_only_run_skips_qa() {
    let mut fixtures = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut fixtures, |_, _| {}).expect("fixture");
    let options = RunOptions {
        scope: Scope::CheckedOnly,
        ..RunOptions::default()
    };
    let summary = run_all(&fixture.root(), &options, &ctx("2024-03-01_10-00")).expect("run");
    assert!(summary.qa.is_none());
    assert!(summary.validation.raw.is_none());
    assert!(!fixture.layout().checklist_path().exists());
}

#[test]
fn changed_dictionary_stops_every_entry_point() {
    let mut fixtures = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut fixtures, |_, _| {}).expect("fixture");
    let layout = fixture.layout();
    let current = fs::read_to_string(layout.datadict_path()).expect("read dictionary");
    fs::write(
        layout.datadict_path(),
        current.replace("EEG recordings", "EEG recordings (v2)"),
    )
    .expect("edit dictionary");

    let options = RunOptions::default();
    let root = fixture.root();
    let run = ctx("2024-03-01_10-00");
    for message in [
        run_raw_validation(&root, &options, &run).map(|_| ()),
        run_qa_cycle(&root, &options, &run).map(|_| ()),
        run_tracker_update(&root, &options).map(|_| ()),
        run_all(&root, &options, &run).map(|_| ()),
    ]
    .into_iter()
    .map(|result| result.expect_err("drift must fail").to_string())
    {
        assert!(message.starts_with("Data dictionary has changed"), "{message}");
    }
    assert!(list_snapshots(layout, SnapshotKind::Files).expect("list").is_empty());
    assert!(!layout.tracker_path().exists());
}
