use std::sync::Arc;

use super::{
    MemoryState, OperatorState, Restorable, SingleInputRestorable, SingleInputSnapshotState,
    SnapshotHandle, SnapshotStore, ValuesState,
};
use crate::engine::core::page::{MarkerPage, Page};
use crate::engine::core::serde::PagesSerde;
use crate::engine::errors::SnapshotError;
use crate::test_helpers::factories::PageFactory;

struct Counter {
    seen: u64,
    snapshot: SingleInputSnapshotState,
}

impl Restorable for Counter {
    fn capture(&self, _serde: &PagesSerde) -> Result<OperatorState, SnapshotError> {
        Ok(OperatorState::Values(ValuesState {
            memory: MemoryState::default(),
            next_page: self.seen,
        }))
    }

    fn restore(&mut self, state: OperatorState, _serde: &PagesSerde) -> Result<(), SnapshotError> {
        match state {
            OperatorState::Values(s) => {
                self.seen = s.next_page;
                Ok(())
            }
            _ => Err(OperatorState::mismatch("counter", "Values")),
        }
    }
}

impl SingleInputRestorable for Counter {
    fn snapshot_state(&mut self) -> &mut SingleInputSnapshotState {
        &mut self.snapshot
    }
}

impl Counter {
    fn add(&mut self, page: Page) -> Result<(), SnapshotError> {
        if !self.process_snapshot_page(&page)? {
            self.seen += page.position_count() as u64;
        }
        Ok(())
    }
}

fn counter(store: &Arc<SnapshotStore>) -> Counter {
    Counter {
        seen: 0,
        snapshot: SingleInputSnapshotState::new(Some(SnapshotHandle::new(
            "0-0-0",
            Arc::clone(store),
            PagesSerde::default(),
        ))),
    }
}

#[test]
fn capture_then_restore_rewinds_mutable_state() {
    let store = Arc::new(SnapshotStore::new("task"));
    let mut op = counter(&store);

    op.add(PageFactory::new().with_sequence(0, 3).create()).unwrap();
    op.add(Page::marker(MarkerPage::snapshot_page(1))).unwrap();
    op.add(PageFactory::new().with_sequence(3, 4).create()).unwrap();
    assert_eq!(op.seen, 7);

    op.add(Page::marker(MarkerPage::resume_page(1))).unwrap();
    assert_eq!(op.seen, 3);
    // idempotent
    op.add(Page::marker(MarkerPage::resume_page(1))).unwrap();
    assert_eq!(op.seen, 3);

    let forwarded: Vec<_> = std::iter::from_fn(|| op.snapshot.next_marker())
        .map(|p| *p.as_marker().unwrap())
        .collect();
    assert_eq!(
        forwarded,
        vec![
            MarkerPage::snapshot_page(1),
            MarkerPage::resume_page(1),
            MarkerPage::resume_page(1)
        ]
    );
}

#[test]
fn resume_without_capture_fails() {
    let store = Arc::new(SnapshotStore::new("task"));
    let mut op = counter(&store);
    let err = op
        .add(Page::marker(MarkerPage::resume_page(5)))
        .expect_err("nothing captured");
    assert!(matches!(err, SnapshotError::NotCaptured { snapshot_id: 5, .. }));
}

#[test]
fn disabled_state_only_forwards_markers() {
    let mut op = Counter {
        seen: 0,
        snapshot: SingleInputSnapshotState::default(),
    };
    op.add(Page::marker(MarkerPage::snapshot_page(1))).unwrap();
    assert!(op.snapshot.has_pending_marker());
    assert!(!op.snapshot.is_enabled());
}
