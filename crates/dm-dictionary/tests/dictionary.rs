//! Loading the generated dataset dictionary and guarding it against drift.

use std::fs;

use dm_dictionary::{DataDictionary, DictionaryError, check_drift};
use dm_model::{SpecialColumn, VariableKind};
use dm_store::fixture::{DatasetFixture, FixtureContext};

#[test]
fn loads_base_dictionary() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |_, _| {}).expect("fixture");
    let dictionary =
        DataDictionary::load(&fixture.layout().datadict_path()).expect("load dictionary");

    let columns = dictionary.tracker_columns();
    assert_eq!(&columns[..3], ["id", "consent", "assent"]);
    assert_eq!(columns.len(), 3 + 12 * 3);
    assert!(columns.contains(&"arrow-alert_psychopy_s2_r1_e1".to_string()));
    assert!(columns.contains(&"bbs_status_s3_r1_e1".to_string()));
    assert!(columns.contains(&"abq_s1_r1_e1".to_string()));

    assert_eq!(dictionary.redcap_id_column(), "record_id");
    assert!(dictionary.special(SpecialColumn::Assent).is_some());
    assert!(
        dictionary
            .subject_ranges()
            .expect("subject ranges")
            .contains("3080001")
    );
    assert!(dictionary.is_combination_member("arrow-alert-v1-2_psychopy"));
    assert!(matches!(
        dictionary.get("all_eeg").expect("eeg row").kind,
        VariableKind::Direct { .. }
    ));
    assert_eq!(
        dictionary.direct_datatypes().into_iter().collect::<Vec<_>>(),
        vec!["audacity", "digi", "eeg", "psychopy", "zoom"]
    );

    let order = dictionary.derivation_order();
    let position = |v: &str| order.iter().position(|o| o == v).expect("derived variable");
    assert!(position("arrow-alert_psychopy") < position("bbs_data"));
    assert!(position("bbs_data") < position("bbs_status"));
    assert!(position("iqs_data") < position("iqs_status"));
}

#[test]
fn unchanged_dictionary_has_no_drift() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |_, _| {}).expect("fixture");
    let layout = fixture.layout();
    check_drift(&layout.datadict_path(), &layout.datadict_latest_path()).expect("no drift");
}

#[test]
fn edited_description_is_drift() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |_, _| {}).expect("fixture");
    let layout = fixture.layout();
    let path = layout.datadict_path();
    let edited = fs::read_to_string(&path)
        .expect("read dictionary")
        .replace("Participant ID", "participant ID");
    fs::write(&path, edited).expect("write dictionary");

    let err = check_drift(&path, &layout.datadict_latest_path()).unwrap_err();
    assert!(matches!(err, DictionaryError::Drift { .. }));
    assert!(err.to_string().starts_with("Data dictionary has changed"));
}

#[test]
fn cyclic_status_rows_are_rejected() {
    let mut ctx = FixtureContext::new();
    let fixture = DatasetFixture::create(&mut ctx, |files, _| {
        files.add_dictionary_row([
            "loop_a", "status", "", "", "NA", "", "NA, 0, 1", "", r#"variables: "loop_b""#, "NA",
        ]);
        files.add_dictionary_row([
            "loop_b", "status", "", "", "NA", "", "NA, 0, 1", "", r#"variables: "loop_a""#, "NA",
        ]);
    })
    .expect("fixture");

    let err = DataDictionary::load(&fixture.layout().datadict_path()).unwrap_err();
    assert!(matches!(err, DictionaryError::Cycle { .. }), "{err}");
}
