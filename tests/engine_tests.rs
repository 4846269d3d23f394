use archive_renamer::config::AppConfig;
use archive_renamer::error::Error;
use archive_renamer::{
    AssumeNo, AssumeYes, Outcome, RenameEngine, RunMode, RunStatus, SilentReporter, Tag,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use walkdir::WalkDir;

/// Create files (with their contents) under `root`, making parent folders.
fn create_test_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// Relative path -> contents ("<dir>" for folders), run logs left out.
fn tree_listing(root: &Path) -> BTreeMap<String, String> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            !(name.ends_with(".log") && name.contains("archive_rename_log_"))
        })
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            let content = if e.file_type().is_dir() {
                "<dir>".to_string()
            } else {
                fs::read_to_string(e.path()).unwrap()
            };
            (rel, content)
        })
        .collect()
}

fn sample_tree(root: &Path) {
    create_test_tree(
        root,
        &[
            ("Foo Bar/Sub A/scan2.TIF", "two"),
            ("Foo Bar/Sub A/scan1.tif", "one"),
            ("Foo Bar/Sub A/notes.txt", "notes"),
            ("Müller/img.jpg", "jpg"),
            ("readme.pdf", "readme"),
        ],
    );
}

#[test]
fn test_full_run_renames_folders_and_files() {
    let tmp = tempdir().unwrap();
    sample_tree(tmp.path());

    let engine = RenameEngine::new(AppConfig::default());
    let record = engine
        .run(tmp.path(), RunMode::Real, &AssumeYes, &SilentReporter)
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed, "failure: {:?}", record.failure);
    assert_eq!(record.count(Outcome::Applied), 6);
    assert_eq!(record.count(Outcome::Failed), 0);

    let listing = tree_listing(tmp.path());
    let expected: BTreeMap<String, String> = [
        ("foo_bar", "<dir>"),
        ("foo_bar/sub_a", "<dir>"),
        ("foo_bar/sub_a/x_x_foo_bar_sub_a_0001.tif", "one"),
        ("foo_bar/sub_a/x_x_foo_bar_sub_a_0002.tif", "two"),
        ("foo_bar/sub_a/notes.txt", "notes"),
        ("mueller", "<dir>"),
        ("mueller/x_x_x_mueller_0001.jpg", "jpg"),
        ("readme.pdf", "readme"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(listing, expected);

    let log_path = record.log_path.clone().expect("real run writes a log");
    assert!(log_path.starts_with(record.root.as_path()));
    let log_text = fs::read_to_string(&log_path).unwrap();
    assert!(log_text.contains("\tRENAMED_DIR\t"));
    assert!(log_text.contains("\tRENAMED_FILE\t"));
    assert!(log_text.lines().last().unwrap().contains("FINISHED"));
}

#[test]
fn test_folders_renamed_before_files_and_deepest_first() {
    let tmp = tempdir().unwrap();
    sample_tree(tmp.path());

    let record = RenameEngine::new(AppConfig::default())
        .run(tmp.path(), RunMode::Real, &AssumeYes, &SilentReporter)
        .unwrap();

    let kinds: Vec<_> = record
        .operations
        .iter()
        .map(|r| r.operation.sequence_index.is_some())
        .collect();
    let first_file = kinds.iter().position(|is_file| *is_file).unwrap();
    assert!(kinds[first_file..].iter().all(|is_file| *is_file));
    assert!(record.operations[0]
        .operation
        .source_path
        .ends_with("Foo Bar/Sub A"));
}

#[test]
fn test_dry_run_leaves_tree_identical() {
    let tmp = tempdir().unwrap();
    sample_tree(tmp.path());
    let before = tree_listing(tmp.path());
    let entries_before = fs::read_dir(tmp.path()).unwrap().count();

    let record = RenameEngine::new(AppConfig::default())
        .run(tmp.path(), RunMode::DryRun, &AssumeNo, &SilentReporter)
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.count(Outcome::WouldApply), 6);
    assert_eq!(record.count(Outcome::Applied), 0);
    assert!(record.log_path.is_none());
    assert_eq!(tree_listing(tmp.path()), before);
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), entries_before);
    assert_eq!(record.events_tagged(Tag::WouldRenameDir).count(), 3);
}

#[test]
fn test_dry_run_log_can_be_sent_elsewhere() {
    let tmp = tempdir().unwrap();
    let logs = tempdir().unwrap();
    sample_tree(tmp.path());

    let config = AppConfig::default().with_log_dir(logs.path());
    let record = RenameEngine::new(config)
        .run(tmp.path(), RunMode::DryRun, &AssumeNo, &SilentReporter)
        .unwrap();

    let log_path = record.log_path.unwrap();
    assert!(log_path.starts_with(logs.path()));
    assert!(fs::read_to_string(log_path)
        .unwrap()
        .contains("WOULD_RENAME_FILE"));
}

#[test]
fn test_too_deep_tree_aborts_without_mutation() {
    let tmp = tempdir().unwrap();
    create_test_tree(
        tmp.path(),
        &[
            ("A/B/C/D/E/deep.tif", "deep"),
            ("Other Folder/page.tif", "page"),
        ],
    );
    let before = tree_listing(tmp.path());

    let record = RenameEngine::new(AppConfig::default())
        .run(tmp.path(), RunMode::Real, &AssumeYes, &SilentReporter)
        .unwrap();

    assert_eq!(record.status, RunStatus::Aborted);
    match &record.failure {
        Some(Error::DepthExceeded {
            found, violations, ..
        }) => {
            assert_eq!(*found, 5);
            assert_eq!(violations.len(), 1);
        }
        other => panic!("expected depth failure, got {:?}", other),
    }
    assert!(record.operations.is_empty());
    assert_eq!(tree_listing(tmp.path()), before);
    assert!(record.events_tagged(Tag::Abort).count() >= 1);
}

#[test]
fn test_declined_confirmation_changes_nothing() {
    let tmp = tempdir().unwrap();
    sample_tree(tmp.path());
    let before = tree_listing(tmp.path());

    let record = RenameEngine::new(AppConfig::default())
        .run(tmp.path(), RunMode::Real, &AssumeNo, &SilentReporter)
        .unwrap();

    assert_eq!(record.status, RunStatus::Cancelled);
    assert_eq!(record.count(Outcome::Skipped), 6);
    assert_eq!(tree_listing(tmp.path()), before);
}

#[test]
fn test_confirmation_sees_the_question() {
    let tmp = tempdir().unwrap();
    sample_tree(tmp.path());

    let asked = std::cell::RefCell::new(Vec::new());
    let confirm = |question: &str| {
        asked.borrow_mut().push(question.to_string());
        true
    };
    let record = RenameEngine::new(AppConfig::default())
        .run(tmp.path(), RunMode::Real, &confirm, &SilentReporter)
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    let asked = asked.borrow();
    assert_eq!(asked.len(), 1);
    assert!(asked[0].contains("3 folders and 3 files"));
}

#[test]
fn test_second_run_is_a_no_op() {
    let tmp = tempdir().unwrap();
    sample_tree(tmp.path());
    let engine = RenameEngine::new(AppConfig::default());

    engine
        .run(tmp.path(), RunMode::Real, &AssumeYes, &SilentReporter)
        .unwrap();
    let after_first = tree_listing(tmp.path());

    let record = engine
        .run(tmp.path(), RunMode::Real, &AssumeYes, &SilentReporter)
        .unwrap();
    assert_eq!(record.status, RunStatus::Completed);
    assert!(record.operations.is_empty());
    assert_eq!(tree_listing(tmp.path()), after_first);
}

#[test]
fn test_missing_root_is_an_error() {
    let tmp = tempdir().unwrap();
    let result = RenameEngine::new(AppConfig::default()).run(
        &tmp.path().join("nope"),
        RunMode::DryRun,
        &AssumeYes,
        &SilentReporter,
    );
    assert!(matches!(result, Err(Error::RootMissing(_))));
}

#[test]
fn test_colliding_folder_names_get_suffixes() {
    let tmp = tempdir().unwrap();
    create_test_tree(
        tmp.path(),
        &[("Box 1/a.tif", "first"), ("box_1/b.tif", "second")],
    );

    let record = RenameEngine::new(AppConfig::default())
        .run(tmp.path(), RunMode::Real, &AssumeYes, &SilentReporter)
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed, "failure: {:?}", record.failure);
    assert_eq!(record.events_tagged(Tag::Warning).count(), 1);
    let listing = tree_listing(tmp.path());
    assert!(listing.contains_key("box_1"));
    assert!(listing.contains_key("box_1_dup1"));
    assert_eq!(
        listing.values().filter(|v| v.as_str() != "<dir>").count(),
        2
    );
}
