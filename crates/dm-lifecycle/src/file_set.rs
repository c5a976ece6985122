//! The files that travel with one identifier between trees.

use std::path::{Path, PathBuf};

use dm_model::Identifier;
use dm_store::{file_name_of, list_files_sorted};
use dm_validate::{FileClass, Resolver};

/// Files in `dir` belonging to `identifier`: its data files under any info
/// string or extension, its exception files, and any file whose name holds
/// no identifier at all. A missing directory yields an empty set.
pub fn identifier_files(
    dir: &Path,
    identifier: &Identifier,
    resolver: Resolver<'_>,
) -> dm_store::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let files = list_files_sorted(dir)?
        .into_iter()
        .filter(|path| belongs_to(&resolver.classify(&file_name_of(path)), identifier))
        .collect();
    Ok(files)
}

fn belongs_to(class: &FileClass, identifier: &Identifier) -> bool {
    match class {
        FileClass::Data(parsed) => &parsed.identifier == identifier,
        FileClass::Deviation(id) | FileClass::NoData(id) => id == identifier,
        FileClass::GroupDeviation
        | FileClass::GroupNoData
        | FileClass::IssueFile
        | FileClass::Unparsed => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_dictionary::DataDictionary;
    use dm_model::DictionaryRow;
    use std::fs;
    use tempfile::TempDir;

    fn dictionary() -> DataDictionary {
        let id = DictionaryRow::from_columns(
            "id",
            "id",
            "Participant ID",
            "NA",
            "[3000000,3009999]",
            "NA",
            r#"file: "consent"; variable: "record_id""#,
        )
        .unwrap();
        DataDictionary::from_rows(vec![id]).unwrap()
    }

    #[test]
    fn collects_data_exceptions_and_sidecars() {
        let dir = TempDir::new().unwrap();
        for name in [
            "sub-3000001_all_eeg_s1_r1_e1.eeg",
            "sub-3000001_all_eeg_s1_r1_e1_extra.vhdr",
            "sub-3000001_all_eeg_s1_r1_e1-deviation.txt",
            "sub-3000001_all_eeg_s1_r1_e2.eeg",
            "sub-3000001_all_eeg_s1_r1_e2-no-data.txt",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        let dictionary = dictionary();
        let resolver = Resolver::new(&dictionary, false);
        let identifier: Identifier = "sub-3000001_all_eeg_s1_r1_e1".parse().unwrap();

        let names: Vec<String> = identifier_files(dir.path(), &identifier, resolver)
            .unwrap()
            .iter()
            .map(|path| file_name_of(path))
            .collect();
        assert_eq!(
            names,
            vec![
                "notes.txt",
                "sub-3000001_all_eeg_s1_r1_e1-deviation.txt",
                "sub-3000001_all_eeg_s1_r1_e1.eeg",
                "sub-3000001_all_eeg_s1_r1_e1_extra.vhdr",
            ]
        );
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let dictionary = dictionary();
        let identifier: Identifier = "sub-3000001_all_eeg_s1_r1_e1".parse().unwrap();
        let files = identifier_files(
            &dir.path().join("absent"),
            &identifier,
            Resolver::new(&dictionary, false),
        )
        .unwrap();
        assert!(files.is_empty());
    }
}
