use std::hash::{Hash, Hasher};

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::engine::errors::SerdeError;

/// Encoded size of a marker: `u64 snapshot_id | u8 is_resuming | u32 task_count`.
pub const MARKER_PAGE_BYTES: usize = 13;

/// Control signal flowing with the data: capture state for `snapshot_id`, or
/// restore it when `is_resuming` is set.
///
/// `task_count` is filled in by the scheduler after creation and takes no part
/// in equality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarkerPage {
    snapshot_id: u64,
    is_resuming: bool,
    task_count: u32,
}

impl MarkerPage {
    pub fn new(snapshot_id: u64, is_resuming: bool, task_count: u32) -> Self {
        Self {
            snapshot_id,
            is_resuming,
            task_count,
        }
    }

    pub fn snapshot_page(snapshot_id: u64) -> Self {
        Self::new(snapshot_id, false, 0)
    }

    pub fn resume_page(snapshot_id: u64) -> Self {
        Self::new(snapshot_id, true, 0)
    }

    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id
    }

    pub fn is_resuming(&self) -> bool {
        self.is_resuming
    }

    pub fn task_count(&self) -> u32 {
        self.task_count
    }

    pub fn set_task_count(&mut self, task_count: u32) {
        self.task_count = task_count;
    }

    pub fn with_task_count(mut self, task_count: u32) -> Self {
        self.task_count = task_count;
        self
    }

    pub fn serialize(&self) -> [u8; MARKER_PAGE_BYTES] {
        let mut out = [0u8; MARKER_PAGE_BYTES];
        let mut buf = &mut out[..];
        buf.put_u64(self.snapshot_id);
        buf.put_u8(u8::from(self.is_resuming));
        buf.put_u32(self.task_count);
        out
    }

    pub fn deserialize(mut bytes: &[u8]) -> Result<Self, SerdeError> {
        if bytes.len() != MARKER_PAGE_BYTES {
            return Err(SerdeError::InvalidMarker {
                expected: MARKER_PAGE_BYTES,
                got: bytes.len(),
            });
        }
        let snapshot_id = bytes.get_u64();
        let is_resuming = bytes.get_u8() != 0;
        let task_count = bytes.get_u32();
        Ok(Self::new(snapshot_id, is_resuming, task_count))
    }
}

impl PartialEq for MarkerPage {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot_id == other.snapshot_id && self.is_resuming == other.is_resuming
    }
}

impl Eq for MarkerPage {}

impl Hash for MarkerPage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.snapshot_id.hash(state);
        self.is_resuming.hash(state);
    }
}
