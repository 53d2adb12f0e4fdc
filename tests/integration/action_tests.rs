use dupfu::actions::{
    ActionConfig, ActionError, ActionExecutor, ActionFatal, ActionKind, ActionPlan, AutoConfirm,
};
use dupfu::pipeline::{DuplicateFinder, ScanConfig, ScanOutcome};
use filetime::{set_file_mtime, FileTime};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Root with one group (`keep.txt` oldest, two copies) and one unique file.
fn fixture() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::write(root.join("keep.txt"), b"0123456789").unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/copy1.txt"), b"0123456789").unwrap();
    fs::write(root.join("sub/copy2.txt"), b"0123456789").unwrap();
    fs::write(root.join("unique.txt"), b"only one").unwrap();

    set_file_mtime(root.join("keep.txt"), FileTime::from_unix_time(1_000, 0)).unwrap();
    set_file_mtime(root.join("sub/copy1.txt"), FileTime::from_unix_time(2_000, 0)).unwrap();
    set_file_mtime(root.join("sub/copy2.txt"), FileTime::from_unix_time(3_000, 0)).unwrap();
    (dir, root)
}

fn scan(root: &Path) -> ScanOutcome {
    DuplicateFinder::new(ScanConfig::default().with_workers(2))
        .scan(root)
        .unwrap()
}

#[test]
fn test_delete_keeps_canonical() {
    let (_dir, root) = fixture();
    let outcome = scan(&root);

    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::permanent())
        .delete(&AutoConfirm)
        .unwrap();

    assert_eq!(report.kind, ActionKind::Delete);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.bytes, 20);
    assert!(report.all_succeeded());
    assert!(root.join("keep.txt").exists());
    assert!(root.join("unique.txt").exists());
    assert!(!root.join("sub/copy1.txt").exists());
    assert!(!root.join("sub/copy2.txt").exists());

    let rescan = scan(&root);
    assert!(rescan.duplicates.is_empty());
}

#[test]
fn test_delete_continues_after_failure() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
        let path = root.join(name);
        fs::write(&path, b"four copies").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(1_000 + i as i64, 0)).unwrap();
    }
    let outcome = scan(&root);
    fs::remove_file(root.join("c")).unwrap();

    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::permanent())
        .delete(&AutoConfirm)
        .unwrap();

    assert_eq!(report.success_count, 2);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.errors[0].path(), root.join("c"));
    assert!(root.join("a").exists());
    assert!(!root.join("b").exists());
    assert!(!root.join("d").exists());
}

#[test]
fn test_delete_skips_modified_duplicate() {
    let (_dir, root) = fixture();
    let outcome = scan(&root);
    fs::write(root.join("sub/copy1.txt"), b"changed after the scan").unwrap();

    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::permanent())
        .delete(&AutoConfirm)
        .unwrap();

    assert_eq!(report.success_count, 1);
    assert!(matches!(report.errors[0], ActionError::Modified(_)));
    assert!(root.join("sub/copy1.txt").exists());
}

#[test]
fn test_declined_delete_touches_nothing() {
    let (_dir, root) = fixture();
    let outcome = scan(&root);
    let asked = Cell::new(0);
    let refuse = |plan: &ActionPlan| {
        asked.set(plan.files);
        false
    };

    let err = ActionExecutor::new(&outcome.duplicates, ActionConfig::permanent())
        .delete(&refuse)
        .unwrap_err();

    assert!(matches!(err, ActionFatal::Declined(ActionKind::Delete)));
    assert_eq!(asked.get(), 2);
    assert!(root.join("sub/copy1.txt").exists());
    assert!(root.join("sub/copy2.txt").exists());
}

#[test]
fn test_move_into_destination() {
    let (_dir, root) = fixture();
    let dest = root.join(".dup-fu");
    let outcome = scan(&root);

    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::default())
        .relocate(&dest, &AutoConfirm)
        .unwrap();

    assert_eq!(report.success_count, 2);
    assert_eq!(report.target.as_deref(), Some(dest.as_path()));
    assert!(root.join("keep.txt").exists());
    assert!(!root.join("sub/copy1.txt").exists());
    assert_eq!(fs::read(dest.join("copy1.txt")).unwrap(), b"0123456789");
    assert_eq!(fs::read(dest.join("copy2.txt")).unwrap(), b"0123456789");
}

#[test]
fn test_move_resolves_name_collisions() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let dest = root.join("dest");
    fs::create_dir_all(root.join("one")).unwrap();
    fs::create_dir_all(root.join("two")).unwrap();
    fs::create_dir_all(&dest).unwrap();
    fs::write(root.join("orig.txt"), b"shared").unwrap();
    fs::write(root.join("one/photo.jpg"), b"shared").unwrap();
    fs::write(root.join("two/photo.jpg"), b"shared").unwrap();
    fs::write(dest.join("photo.jpg"), b"already here").unwrap();
    set_file_mtime(root.join("orig.txt"), FileTime::from_unix_time(10, 0)).unwrap();

    let config = ScanConfig::default().with_walker_config(
        dupfu::scanner::WalkerConfig::default().with_excluded_dir(dest.clone()),
    );
    let outcome = DuplicateFinder::new(config).scan(&root).unwrap();

    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::default())
        .relocate(&dest, &AutoConfirm)
        .unwrap();

    assert_eq!(report.success_count, 2);
    assert_eq!(fs::read(dest.join("photo.jpg")).unwrap(), b"already here");
    assert_eq!(fs::read(dest.join("photo-1.jpg")).unwrap(), b"shared");
    assert_eq!(fs::read(dest.join("photo-2.jpg")).unwrap(), b"shared");
}

#[test]
fn test_export_lists_exactly_the_duplicates() {
    let (_dir, root) = fixture();
    let dest = root.join(".dup-fu");
    let outcome = scan(&root);

    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::default())
        .export(&dest, &AutoConfirm)
        .unwrap();

    let manifest = dest.join("duplicates.txt");
    assert_eq!(report.target.as_deref(), Some(manifest.as_path()));
    let content = fs::read_to_string(&manifest).unwrap();
    let mut listed: Vec<PathBuf> = content.lines().map(PathBuf::from).collect();
    listed.sort();
    let mut expected = outcome.duplicates.duplicate_paths();
    expected.sort();

    assert_eq!(listed, expected);
    assert!(!listed.contains(&root.join("keep.txt")));
    assert!(root.join("sub/copy1.txt").exists());
}

#[test]
fn test_export_with_custom_manifest_name() {
    let (_dir, root) = fixture();
    let dest = root.join("out");
    let outcome = scan(&root);

    ActionExecutor::new(
        &outcome.duplicates,
        ActionConfig::default().with_manifest_name("dupes.lst"),
    )
    .export(&dest, &AutoConfirm)
    .unwrap();

    assert_eq!(
        fs::read_to_string(dest.join("dupes.lst")).unwrap().lines().count(),
        2
    );
}

#[cfg(unix)]
#[test]
fn test_delete_permission_failure_is_per_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let locked = root.join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(root.join("keep"), b"payload").unwrap();
    fs::write(root.join("dup1"), b"payload").unwrap();
    fs::write(root.join("dup2"), b"payload").unwrap();
    fs::write(locked.join("dup3"), b"payload").unwrap();
    set_file_mtime(root.join("keep"), FileTime::from_unix_time(1_000, 0)).unwrap();

    let outcome = scan(&root);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::permanent())
        .delete(&AutoConfirm)
        .unwrap();
    let still_there = locked.join("dup3").exists();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    // Running as root bypasses directory permissions.
    if still_there {
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count(), 1);
        assert!(matches!(report.errors[0], ActionError::PermissionDenied(_)));
    } else {
        assert_eq!(report.success_count, 3);
    }
    assert!(root.join("keep").exists());
}

#[cfg(unix)]
#[test]
fn test_export_skips_paths_with_line_breaks() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let keep = root.join("keep");
    let split = root.join("two\nlines");
    let plain = root.join("plain");
    fs::write(&keep, b"same bytes").unwrap();
    fs::write(&split, b"same bytes").unwrap();
    fs::write(&plain, b"same bytes").unwrap();
    set_file_mtime(&keep, FileTime::from_unix_time(1_000, 0)).unwrap();

    let outcome = scan(&root);
    let dest = root.join(".dup-fu");
    let report = ActionExecutor::new(&outcome.duplicates, ActionConfig::default())
        .export(&dest, &AutoConfirm)
        .unwrap();

    assert_eq!(report.success_count, 1);
    assert_eq!(report.failure_count(), 1);
    assert!(matches!(&report.errors[0], ActionError::MultiLinePath { path } if *path == split));

    let content = fs::read_to_string(dest.join("duplicates.txt")).unwrap();
    let listed: Vec<PathBuf> = content.lines().map(PathBuf::from).collect();
    assert_eq!(listed, vec![plain]);
}
