use clap::Parser;
use dupfu::cli::Cli;
use dupfu::config::Config;
use dupfu::error::ExitCode;
use dupfu::run_app;
use dupfu::pipeline::DuplicateFinder;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn test_file_then_cli_layers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "workers = 6\nhash_queue_capacity = 8\nignore_patterns = [\"*.tmp\"]\n",
    )
    .unwrap();

    let mut config = Config::load_from(Some(path.as_path())).unwrap();
    assert_eq!(config.workers, 6);
    assert_eq!(config.hash_queue_capacity, 8);

    let cli = Cli::try_parse_from(["dupfu", "--workers", "2", "-i", "*.bak"]).unwrap();
    cli.apply_to(&mut config);

    assert_eq!(config.workers, 2);
    assert_eq!(config.hash_queue_capacity, 8);
    assert_eq!(config.ignore_patterns, vec!["*.tmp", "*.bak"]);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "walk_queue_capacity = -1\n").unwrap();

    assert!(Config::load_from(Some(path.as_path())).is_err());
}

#[test]
fn test_print_config_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("saved.toml");
    let config = Config {
        skip_hidden: true,
        stats_interval_ms: 250,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(Some(path.as_path())).unwrap(), config);
}

#[test]
fn test_save_config_writes_effective_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/config.toml");
    let cli = Cli::try_parse_from([
        "dupfu",
        "--save-config",
        "--config",
        path.to_str().unwrap(),
        "--workers",
        "5",
        "--skip-hidden",
        "-q",
    ])
    .unwrap();

    let code = run_app(cli).unwrap();

    assert_eq!(code, ExitCode::Success);
    let saved = Config::load_from(Some(path.as_path())).unwrap();
    assert_eq!(saved.workers, 5);
    assert!(saved.skip_hidden);
}

#[test]
fn test_config_drives_scan() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::write(root.join("a.txt"), b"same").unwrap();
    fs::write(root.join("b.txt"), b"same").unwrap();
    fs::write(root.join("c.tmp"), b"same").unwrap();
    fs::create_dir(root.join(".dup-fu")).unwrap();
    fs::write(root.join(".dup-fu/d.txt"), b"same").unwrap();

    let config = Config {
        ignore_patterns: vec!["*.tmp".into()],
        workers: 1,
        ..Config::default()
    };
    let destination = config.default_destination(&root);
    let outcome = DuplicateFinder::new(config.scan_config(Some(destination.as_path())))
        .scan(&root)
        .unwrap();

    assert_eq!(outcome.stats.counters.files_scanned, 2);
    assert_eq!(outcome.duplicates.duplicate_count(), 1);
    assert!(!outcome
        .duplicates
        .duplicate_paths()
        .iter()
        .any(|p| p.starts_with(Path::new(&destination))));
}
