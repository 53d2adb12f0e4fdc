use dupfu::duplicates::GroupSummary;
use dupfu::pipeline::{DuplicateFinder, FinderError, ScanConfig, StatsSnapshot};
use dupfu::progress::ScanObserver;
use dupfu::scanner::{resolve_path, WalkerConfig};
use filetime::{set_file_mtime, FileTime};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut file = File::create(path).unwrap();
    file.write_all(content).unwrap();
}

fn set_age(path: &Path, secs: i64) {
    set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}

fn finder() -> DuplicateFinder {
    DuplicateFinder::new(ScanConfig::default().with_workers(4))
}

#[derive(Default)]
struct Recorder {
    group_updates: AtomicUsize,
    completions: Mutex<Vec<StatsSnapshot>>,
}

impl ScanObserver for Recorder {
    fn on_group_updated(&self, _summary: &GroupSummary) {
        self.group_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(&self, stats: &StatsSnapshot) {
        self.completions.lock().unwrap().push(*stats);
    }
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let outcome = finder().scan(dir.path()).unwrap();

    assert!(outcome.duplicates.is_empty());
    assert_eq!(outcome.stats.counters.files_scanned, 0);
    assert!(outcome.stats.scan_complete);
    assert!(outcome.stats.duplicate_percent().is_none());
}

#[test]
fn test_scan_finds_groups_across_subdirectories() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    write(&root.join("a.txt"), b"alpha content");
    write(&root.join("nested/a-copy.txt"), b"alpha content");
    write(&root.join("nested/deeper/a-again.txt"), b"alpha content");
    write(&root.join("b.txt"), b"bravo");
    write(&root.join("nested/b-copy.txt"), b"bravo");
    write(&root.join("unique.txt"), b"nothing like it");

    let outcome = finder().scan(&root).unwrap();
    let counters = outcome.stats.counters;

    assert_eq!(counters.files_scanned, 6);
    assert_eq!(counters.total_bytes, 13 * 3 + 5 * 2 + 15);
    assert_eq!(outcome.duplicates.sets().len(), 2);
    assert_eq!(counters.duplicate_count, 3);
    assert_eq!(counters.duplicate_bytes, 13 * 2 + 5);
    assert_eq!(outcome.report.files_discovered, 6);
    assert!(!outcome.report.has_errors());
}

#[test]
fn test_counters_match_snapshot() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for i in 0..30 {
        // Ten distinct contents, three copies each
        write(
            &root.join(format!("f{i:02}.bin")),
            format!("content number {}", i % 10).as_bytes(),
        );
    }

    let outcome = finder().scan(&root).unwrap();
    let snapshot = &outcome.duplicates;
    let counters = outcome.stats.counters;

    assert_eq!(snapshot.sets().len(), 10);
    assert_eq!(counters.duplicate_count, snapshot.duplicate_count() as u64);
    assert_eq!(counters.duplicate_bytes, snapshot.duplicate_bytes());
    let members: usize = snapshot.sets().iter().map(|s| s.duplicates.len() + 1).sum();
    assert_eq!(members as u64, counters.files_scanned);
}

#[test]
fn test_oldest_file_is_canonical() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let newest = root.join("a-newest.txt");
    let oldest = root.join("z-oldest.txt");
    let middle = root.join("m-middle.txt");
    for path in [&newest, &oldest, &middle] {
        write(path, b"same bytes everywhere");
    }
    set_age(&newest, 3_000_000);
    set_age(&middle, 2_000_000);
    set_age(&oldest, 1_000_000);

    let outcome = finder().scan(&root).unwrap();
    let set = &outcome.duplicates.sets()[0];

    assert_eq!(set.canonical.path, oldest);
    let dups: Vec<_> = set.duplicates.iter().map(|d| d.path.clone()).collect();
    assert_eq!(dups, vec![middle, newest]);
    assert!(outcome.duplicates.is_canonical(&oldest));
}

#[test]
fn test_empty_files_are_not_duplicates() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    write(&root.join("empty1"), b"");
    write(&root.join("empty2"), b"");

    let outcome = finder().scan(&root).unwrap();

    assert!(outcome.duplicates.is_empty());
    assert_eq!(outcome.stats.counters.files_scanned, 0);
}

#[test]
fn test_walker_filters_apply() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    write(&root.join("keep.txt"), b"payload");
    write(&root.join("keep2.txt"), b"payload");
    write(&root.join(".hidden/copy.txt"), b"payload");
    write(&root.join("scratch.tmp"), b"payload");

    let config = ScanConfig::default().with_walker_config(WalkerConfig::new(
        true,
        vec!["*.tmp".to_string()],
    ));
    let outcome = DuplicateFinder::new(config).scan(&root).unwrap();

    assert_eq!(outcome.stats.counters.files_scanned, 2);
    assert_eq!(outcome.duplicates.duplicate_count(), 1);
}

#[test]
fn test_destination_directory_is_not_scanned() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let dest = root.join(".dup-fu");
    write(&root.join("a.txt"), b"payload");
    write(&dest.join("a.txt"), b"payload");

    let walker = WalkerConfig::default().with_excluded_dir(dest);
    let config = ScanConfig::default().with_walker_config(walker);
    let outcome = DuplicateFinder::new(config).scan(&root).unwrap();

    assert_eq!(outcome.stats.counters.files_scanned, 1);
    assert!(outcome.duplicates.is_empty());
}

#[cfg(unix)]
#[test]
fn test_destination_excluded_through_symlinked_root() {
    let dir = tempdir().unwrap();
    let real = dir.path().join("real");
    write(&real.join("a.txt"), b"payload");
    write(&real.join(".dup-fu/a.txt"), b"payload");
    set_age(&real.join(".dup-fu/a.txt"), 1_000);
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let walker = WalkerConfig::default().with_excluded_dir(link.join(".dup-fu"));
    let config = ScanConfig::default().with_walker_config(walker);
    let outcome = DuplicateFinder::new(config).scan(&link).unwrap();

    assert_eq!(outcome.stats.counters.files_scanned, 1);
    assert!(outcome.duplicates.is_empty());
}

#[cfg(unix)]
#[test]
fn test_new_destination_under_symlinked_root_is_excluded() {
    let dir = tempdir().unwrap();
    let real = dir.path().join("real");
    write(&real.join("a.txt"), b"payload");
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let dest = resolve_path(&link.join("dupes/nested")).unwrap();
    assert_eq!(dest, fs::canonicalize(&real).unwrap().join("dupes/nested"));

    write(&dest.join("a.txt"), b"payload");
    let walker = WalkerConfig::default().with_excluded_dir(link.join("dupes/nested"));
    let config = ScanConfig::default().with_walker_config(walker);
    let outcome = DuplicateFinder::new(config).scan(&link).unwrap();

    assert_eq!(outcome.stats.counters.files_scanned, 1);
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    write(&root.join("real.txt"), b"payload");
    std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();

    let outcome = finder().scan(&root).unwrap();

    assert_eq!(outcome.stats.counters.files_scanned, 1);
    assert!(outcome.duplicates.is_empty());
}

#[test]
fn test_single_worker_and_tiny_queues() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for i in 0..50 {
        write(&root.join(format!("{i}.dat")), format!("{}", i % 5).as_bytes());
    }

    let config = ScanConfig::default()
        .with_workers(1)
        .with_queue_capacities(1, 1);
    let outcome = DuplicateFinder::new(config).scan(&root).unwrap();

    assert_eq!(outcome.stats.counters.files_scanned, 50);
    assert_eq!(outcome.duplicates.sets().len(), 5);
    assert_eq!(outcome.stats.counters.duplicate_count, 45);
}

#[test]
fn test_observer_sees_groups_and_completion() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    write(&root.join("1"), b"abc");
    write(&root.join("2"), b"abc");
    write(&root.join("3"), b"abc");

    let recorder = Arc::new(Recorder::default());
    let outcome = finder()
        .with_observer(recorder.clone())
        .scan(&root)
        .unwrap();

    assert_eq!(recorder.group_updates.load(Ordering::SeqCst), 2);
    let completions = recorder.completions.lock().unwrap();
    assert_eq!(completions.len(), 1);
    assert!(completions[0].scan_complete);
    assert_eq!(completions[0].counters, outcome.stats.counters);
}

#[test]
fn test_independent_scans_do_not_share_state() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    write(&first.path().join("x"), b"dup");
    write(&first.path().join("y"), b"dup");
    write(&second.path().join("z"), b"solo");

    let finder = finder();
    let a = finder.scan(first.path()).unwrap();
    let b = finder.scan(second.path()).unwrap();

    assert_eq!(a.stats.counters.files_scanned, 2);
    assert_eq!(b.stats.counters.files_scanned, 1);
    assert!(b.duplicates.is_empty());
}

#[test]
fn test_missing_root_is_fatal() {
    let dir = tempdir().unwrap();
    let err = finder().scan(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, FinderError::RootInaccessible { .. }));
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_is_reported() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let locked = root.join("locked");
    write(&locked.join("inner.txt"), b"secret");
    write(&root.join("open.txt"), b"visible");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Running as root bypasses permission checks.
    let readable = fs::read_dir(&locked).is_ok();
    let outcome = finder().scan(&root).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    if !readable {
        assert_eq!(outcome.report.traversal_errors.len(), 1);
        assert_eq!(outcome.stats.counters.files_scanned, 1);
    }
}
