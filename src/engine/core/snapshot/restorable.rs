use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use super::state::OperatorState;
use super::store::SnapshotStore;
use crate::engine::core::page::{MarkerPage, Page};
use crate::engine::core::serde::PagesSerde;
use crate::engine::errors::SnapshotError;

/// An operator whose state can be captured at a marker and restored later.
/// `restore` must be idempotent and keep helpers built from constructor
/// arguments, replacing only mutable fields.
pub trait Restorable {
    fn capture(&self, serde: &PagesSerde) -> Result<OperatorState, SnapshotError>;

    fn restore(&mut self, state: OperatorState, serde: &PagesSerde) -> Result<(), SnapshotError>;
}

/// What an operator needs to take part in the snapshot protocol.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    unique_id: String,
    store: Arc<SnapshotStore>,
    serde: PagesSerde,
}

impl SnapshotHandle {
    pub fn new(unique_id: impl Into<String>, store: Arc<SnapshotStore>, serde: PagesSerde) -> Self {
        Self {
            unique_id: unique_id.into(),
            store,
            serde,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Captures `operator` into the store for a snapshot marker, or loads and
    /// restores the stored state for a resume marker.
    pub fn process_marker<R>(&self, operator: &mut R, marker: &MarkerPage) -> Result<(), SnapshotError>
    where
        R: Restorable + ?Sized,
    {
        let snapshot_id = marker.snapshot_id();
        if marker.is_resuming() {
            let state = self.store.load_state(snapshot_id, &self.unique_id)?;
            debug!(target: "snapflow::snapshot", operator = %self.unique_id, snapshot_id, kind = state.kind(), "Restoring operator");
            operator.restore(state, &self.serde)
        } else {
            let state = operator.capture(&self.serde)?;
            self.store.store_state(snapshot_id, &self.unique_id, state)
        }
    }
}

/// Snapshot bookkeeping for an operator with a single input channel. Markers
/// are queued for forwarding; without a handle they are forwarded untouched.
#[derive(Debug, Default)]
pub struct SingleInputSnapshotState {
    handle: Option<SnapshotHandle>,
    pending_markers: VecDeque<Page>,
}

impl SingleInputSnapshotState {
    pub fn new(handle: Option<SnapshotHandle>) -> Self {
        Self {
            handle,
            pending_markers: VecDeque::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<SnapshotHandle> {
        self.handle.clone()
    }

    pub fn push_marker(&mut self, page: Page) {
        self.pending_markers.push_back(page);
    }

    pub fn has_pending_marker(&self) -> bool {
        !self.pending_markers.is_empty()
    }

    pub fn next_marker(&mut self) -> Option<Page> {
        self.pending_markers.pop_front()
    }
}

pub trait SingleInputRestorable: Restorable {
    fn snapshot_state(&mut self) -> &mut SingleInputSnapshotState;

    /// Returns true if `page` was a marker. The operator has then been
    /// captured or restored and the marker is queued for output.
    fn process_snapshot_page(&mut self, page: &Page) -> Result<bool, SnapshotError> {
        let Some(marker) = page.as_marker() else {
            return Ok(false);
        };
        if let Some(handle) = self.snapshot_state().handle() {
            handle.process_marker(self, marker)?;
        }
        self.snapshot_state().push_marker(page.clone());
        Ok(true)
    }
}
