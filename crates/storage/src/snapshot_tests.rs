// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use icarus_core::{Event, JobId};
use tempfile::tempdir;

fn state_with_job(id: &str) -> MaterializedState {
    let mut state = MaterializedState::default();
    state.apply_event(&Event::JobCreated {
        id: JobId::from_string(id),
        task: "t".into(),
        project_path: "/tmp/p".into(),
        created_at_ms: 1,
    });
    state
}

#[test]
fn save_and_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    let snapshot = Snapshot::new(7, state_with_job("job-a"));
    save_snapshot(&path, &snapshot).unwrap();

    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 7);
    assert_eq!(loaded.version, CURRENT_SNAPSHOT_VERSION);
    assert!(loaded.state.jobs.contains_key("job-a"));
}

#[test]
fn load_missing_returns_none() {
    let dir = tempdir().unwrap();
    assert!(load_snapshot(&dir.path().join("nope.json")).unwrap().is_none());
}

#[test]
fn overwrite_keeps_a_backup() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    save_snapshot(&path, &Snapshot::new(1, state_with_job("job-a"))).unwrap();
    save_snapshot(&path, &Snapshot::new(2, state_with_job("job-b"))).unwrap();

    assert!(path.with_extension("bak").exists());
    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 2);
}

#[test]
fn unknown_version_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    let mut snapshot = Snapshot::new(1, MaterializedState::default());
    snapshot.version = 99;
    std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    assert!(matches!(load_snapshot(&path), Err(SnapshotError::Version(99))));
}
