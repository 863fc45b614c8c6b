use tempfile::tempdir;

use super::{LimitState, MemoryState, OperatorState, SnapshotStatus, SnapshotStore, ValuesState};
use crate::engine::errors::SnapshotError;

fn limit_state(remaining: u64) -> OperatorState {
    OperatorState::Limit(LimitState {
        memory: MemoryState::default(),
        remaining,
        pending: None,
    })
}

#[test]
fn status_completes_once_every_component_captured() {
    let store = SnapshotStore::new("task-1");
    store.register_component("0-0-0");
    store.register_component("0-0-1");

    assert_eq!(store.status(7), SnapshotStatus::InProgress);
    store
        .store_state(
            7,
            "0-0-0",
            OperatorState::Values(ValuesState {
                memory: MemoryState::default(),
                next_page: 1,
            }),
        )
        .unwrap();
    assert_eq!(store.status(7), SnapshotStatus::InProgress);
    store.store_state(7, "0-0-1", limit_state(3)).unwrap();
    assert_eq!(store.status(7), SnapshotStatus::Complete);

    let snapshot = store.task_snapshot(7).expect("captured");
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot["0-0-1"], limit_state(3));
}

#[test]
fn loading_an_uncaptured_snapshot_is_an_error() {
    let store = SnapshotStore::new("task-1");
    store.store_state(1, "op", limit_state(1)).unwrap();

    let err = store.load_state(2, "op").expect_err("never captured");
    assert!(matches!(
        err,
        SnapshotError::NotCaptured { snapshot_id: 2, ref operator_id } if operator_id == "op"
    ));
    assert_eq!(store.load_state(1, "op").unwrap(), limit_state(1));
}

#[test]
fn persisted_states_survive_a_new_store() {
    let dir = tempdir().unwrap();
    {
        let store = SnapshotStore::with_persistence("task/1", dir.path());
        store.store_state(3, "1-0-2", limit_state(9)).unwrap();
    }

    let store = SnapshotStore::with_persistence("task/1", dir.path());
    assert_eq!(store.load_state(3, "1-0-2").unwrap(), limit_state(9));

    store.remove_snapshot(3).unwrap();
    assert!(matches!(
        store.load_state(3, "1-0-2"),
        Err(SnapshotError::NotCaptured { .. })
    ));
}
