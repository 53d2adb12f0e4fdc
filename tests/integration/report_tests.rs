use dupfu::actions::{ActionConfig, ActionExecutor, AutoConfirm};
use dupfu::error::ExitCode;
use dupfu::exit_code_for;
use dupfu::output::{self, json};
use dupfu::pipeline::{DuplicateFinder, ScanConfig, ScanOutcome};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn scan(root: &Path) -> ScanOutcome {
    DuplicateFinder::new(ScanConfig::default()).scan(root).unwrap()
}

#[test]
fn test_exit_code_no_duplicates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"one").unwrap();
    fs::write(dir.path().join("b"), b"two").unwrap();

    let outcome = scan(dir.path());
    assert_eq!(exit_code_for(&outcome, None), ExitCode::NoDuplicates);
}

#[test]
fn test_exit_code_duplicates_found() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"same").unwrap();
    fs::write(dir.path().join("b"), b"same").unwrap();

    let outcome = scan(dir.path());
    assert_eq!(exit_code_for(&outcome, None), ExitCode::Success);
}

#[test]
fn test_exit_code_partial_after_failed_action() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::write(root.join("a"), b"same").unwrap();
    fs::write(root.join("b"), b"same").unwrap();
    fs::write(root.join("c"), b"same").unwrap();

    let outcome = scan(&root);
    let doomed = outcome.duplicates.duplicate_paths()[0].clone();
    fs::remove_file(doomed).unwrap();
    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::permanent())
        .delete(&AutoConfirm)
        .unwrap();

    assert_eq!(report.failure_count(), 1);
    assert_eq!(
        exit_code_for(&outcome, Some(&report)),
        ExitCode::PartialSuccess
    );
}

#[test]
fn test_json_report_shape() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::write(root.join("a.txt"), b"same content").unwrap();
    fs::write(root.join("b.txt"), b"same content").unwrap();
    fs::write(root.join("c.txt"), b"different").unwrap();

    let outcome = scan(&root);
    let text = json::render(&outcome, None, ExitCode::Success).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["summary"]["files_scanned"], 3);
    assert_eq!(value["summary"]["duplicate_groups"], 1);
    assert_eq!(value["summary"]["duplicate_count"], 1);
    assert_eq!(value["summary"]["duplicate_bytes"], 12);
    assert_eq!(value["summary"]["exit_code"], 0);
    assert_eq!(value["summary"]["exit_code_name"], "DF000");
    assert_eq!(value["duplicates"].as_array().unwrap().len(), 1);
    assert_eq!(value["duplicates"][0]["duplicates"].as_array().unwrap().len(), 1);
    assert!(value["action"].is_null());
}

#[test]
fn test_json_report_with_action() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::write(root.join("a.txt"), b"same").unwrap();
    fs::write(root.join("b.txt"), b"same").unwrap();

    let outcome = scan(&root);
    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::default())
        .export(&root.join(".dup-fu"), &AutoConfirm)
        .unwrap();
    let text = json::render(&outcome, Some(&report), ExitCode::Success).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["action"]["kind"], "export");
    assert_eq!(value["action"]["success_count"], 1);
}

#[test]
fn test_text_report_mentions_every_duplicate() {
    yansi::disable();
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::write(root.join("a.txt"), b"same").unwrap();
    fs::write(root.join("b.txt"), b"same").unwrap();
    fs::write(root.join("c.txt"), b"same").unwrap();

    let outcome = scan(&root);
    let text = output::render_text(&outcome, None);

    assert!(text.contains("Found 2 duplicate(s) in 1 group(s)"));
    for path in outcome.duplicates.duplicate_paths() {
        assert!(text.contains(&format!("  = {}", path.display())));
    }
}
