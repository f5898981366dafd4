//! Whole-pipeline tests over record files in a temporary data directory.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use matchmaker_core::store::snapshot;
use matchmaker_core::{
    write_results, Engine, EngineConfig, IndexBuilder, IndexConfig, IndexNeighbors, MatchError,
    MatrixKind, MatrixStore, NeighborSource, NoNeighbors,
};

const WATCHES: &str = "1:10\n1:11\n2:10\n3:20\n4:21\n";
const REPOS: &str = "\
10:a/x,2009-01-01
11:b/x,2009-02-01,10
20:alice/one,2009-03-01
21:alice/two,2009-03-02
";
const TESTS: &str = "5\n1\n3\n";

fn data_dir(watches: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("data.txt"), watches).unwrap();
    fs::write(dir.path().join("repos.txt"), REPOS).unwrap();
    fs::write(dir.path().join("test.txt"), TESTS).unwrap();
    dir
}

fn builder(dir: &Path) -> IndexBuilder {
    IndexBuilder::new(dir, IndexConfig::default())
}

#[test]
fn recommend_writes_one_line_per_test_user() {
    let dir = data_dir(WATCHES);
    let index = builder(dir.path()).build().unwrap();
    let neighbors = IndexNeighbors::new(&index);
    let engine = Engine::new(&index, &neighbors, EngineConfig::default().weights);

    let results = engine.score_all(index.test_users(), Some(2));
    let out = dir.path().join("results.txt");
    write_results(&out, &results).unwrap();

    // 1: fork pair fully watched, only popularity backfill remains.
    // 3: same-author sibling first, then backfill.
    // 5: no history, locality ranking.
    assert_eq!(
        fs::read_to_string(&out).unwrap(),
        "1:20,21\n3:21,10,11\n5:10,11,20,21\n"
    );
}

#[test]
fn snapshot_is_reused_until_sources_change() {
    let dir = data_dir(WATCHES);
    let first = builder(dir.path()).build().unwrap();
    let path = builder(dir.path()).snapshot_path();
    assert!(path.exists());

    let second = builder(dir.path()).build().unwrap();
    assert_eq!(first, second);

    fs::write(dir.path().join("data.txt"), format!("{WATCHES}6:10\n")).unwrap();
    let third = builder(dir.path()).build().unwrap();
    assert_eq!(third.watchers(10), &[1, 2, 6]);
}

#[test]
fn corrupt_snapshot_falls_back_to_rebuild() {
    let dir = data_dir(WATCHES);
    let expected = builder(dir.path()).without_snapshot().build().unwrap();
    let path = builder(dir.path()).snapshot_path();
    fs::write(&path, b"not a snapshot").unwrap();

    let rebuilt = builder(dir.path()).build().unwrap();
    assert_eq!(rebuilt, expected);

    let fingerprint =
        snapshot::source_fingerprint(dir.path(), &IndexConfig::default()).unwrap();
    assert_eq!(snapshot::load(&path, &fingerprint).unwrap(), expected);
}

#[test]
fn without_snapshot_leaves_no_file() {
    let dir = data_dir(WATCHES);
    let b = builder(dir.path()).without_snapshot();
    b.build().unwrap();
    assert!(!b.snapshot_path().exists());
}

#[test]
fn malformed_line_is_fatal() {
    let dir = data_dir("1:10\nbogus\n");
    let err = builder(dir.path()).build().unwrap_err();
    match err {
        MatchError::Parse { line, file, .. } => {
            assert_eq!(line, 2);
            assert!(file.ends_with("data.txt"));
        }
        other => panic!("expected parse error, got {other}"),
    }
    assert!(!builder(dir.path()).snapshot_path().exists());
}

#[test]
fn missing_watch_file_is_an_error_but_others_are_optional() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        builder(dir.path()).without_snapshot().build(),
        Err(MatchError::Io(_))
    ));

    fs::write(dir.path().join("data.txt"), WATCHES).unwrap();
    let index = builder(dir.path()).without_snapshot().build().unwrap();
    assert!(index.test_users().is_empty());
    assert!(index.info(10).is_none());
    assert_eq!(index.watched(1), &[10, 11]);
}

#[test]
fn sqlite_store_serves_the_same_neighbors() {
    let dir = data_dir("1:10\n1:11\n1:12\n2:10\n2:11\n3:10\n3:12\n4:30\n");
    let index = builder(dir.path()).without_snapshot().build().unwrap();
    let store = MatrixStore::open(&dir.path().join("matrix.db")).unwrap();
    store
        .export_matrix(MatrixKind::Repo, index.repo_matrix(), 2)
        .unwrap();
    store
        .export_matrix(MatrixKind::User, index.user_matrix(), 2)
        .unwrap();

    let memory = IndexNeighbors::new(&index);
    for repo in [10, 11, 12, 30] {
        assert_eq!(
            store.repo_neighbors(repo, 5).unwrap(),
            memory.repo_neighbors(repo, 5).unwrap()
        );
    }
    for user in 1..=4 {
        assert_eq!(
            store.user_neighbors(user, 5).unwrap(),
            memory.user_neighbors(user, 5).unwrap()
        );
    }

    let from_store = Engine::new(&index, &store, EngineConfig::default().weights);
    let from_memory = Engine::new(&index, &memory, EngineConfig::default().weights);
    for user in 1..=4 {
        assert_eq!(from_store.score(user), from_memory.score(user));
    }
}

#[test]
fn disabling_neighbors_only_drops_the_collaborative_signal() {
    let dir = data_dir(WATCHES);
    let index = builder(dir.path()).build().unwrap();
    let engine = Engine::new(&index, &NoNeighbors, EngineConfig::default().weights);
    assert_eq!(engine.score(3), vec![21, 10, 11]);
}

#[test]
fn summary_counts_the_loaded_streams() {
    let dir = data_dir(WATCHES);
    let summary = builder(dir.path()).without_snapshot().build().unwrap().summary();
    assert_eq!(summary.users, 4);
    assert_eq!(summary.repos_watched, 4);
    assert_eq!(summary.repos_described, 4);
    assert_eq!(summary.watch_edges, 5);
    assert_eq!(summary.forked_repos, 1);
    assert_eq!(summary.grandchildren, 0);
    assert_eq!(summary.authors, 3);
    assert_eq!(summary.project_names, 3);
    assert_eq!(summary.test_users, 3);
    assert_eq!(summary.repo_matrix_entries, 1);
    assert_eq!(summary.user_matrix_entries, 1);
}
