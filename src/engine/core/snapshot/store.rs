use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::state::OperatorState;
use super::state_file::{StateFileReader, StateFileWriter};
use crate::engine::errors::SnapshotError;
use crate::shared::config::SnapshotConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// Some registered operators have not captured this id yet.
    InProgress,
    Complete,
}

/// Captured operator states of one task, keyed by snapshot id and operator
/// unique id. Owned by the task context and shared by handle.
#[derive(Debug)]
pub struct SnapshotStore {
    task_id: String,
    components: RwLock<BTreeSet<String>>,
    states: Mutex<HashMap<u64, BTreeMap<String, OperatorState>>>,
    persist_dir: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            components: RwLock::new(BTreeSet::new()),
            states: Mutex::new(HashMap::new()),
            persist_dir: None,
        }
    }

    pub fn with_persistence(task_id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let mut store = Self::new(task_id);
        store.persist_dir = Some(dir.into());
        store
    }

    pub fn from_config(task_id: impl Into<String>, config: &SnapshotConfig) -> Self {
        if config.persist {
            Self::with_persistence(task_id, &config.dir)
        } else {
            Self::new(task_id)
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn register_component(&self, unique_id: impl Into<String>) {
        self.components.write().insert(unique_id.into());
    }

    pub fn components(&self) -> Vec<String> {
        self.components.read().iter().cloned().collect()
    }

    fn state_path(&self, snapshot_id: u64, unique_id: &str) -> Option<PathBuf> {
        self.persist_dir.as_ref().map(|dir| {
            dir.join(sanitize(&self.task_id))
                .join(snapshot_id.to_string())
                .join(format!("{}.osn", sanitize(unique_id)))
        })
    }

    pub fn store_state(
        &self,
        snapshot_id: u64,
        unique_id: &str,
        state: OperatorState,
    ) -> Result<(), SnapshotError> {
        if let Some(path) = self.state_path(snapshot_id, unique_id) {
            StateFileWriter::new(&path).write(&state)?;
        }
        debug!(target: "snapflow::snapshot::store", task = %self.task_id, snapshot_id, operator = unique_id, kind = state.kind(), "Captured operator state");
        self.states
            .lock()
            .entry(snapshot_id)
            .or_default()
            .insert(unique_id.to_string(), state);

        if self.status(snapshot_id) == SnapshotStatus::Complete {
            info!(target: "snapflow::snapshot::store", task = %self.task_id, snapshot_id, "Task snapshot complete");
        }
        Ok(())
    }

    /// State captured by `unique_id` for `snapshot_id`, from memory or, when
    /// persistence is on, from disk.
    pub fn load_state(
        &self,
        snapshot_id: u64,
        unique_id: &str,
    ) -> Result<OperatorState, SnapshotError> {
        if let Some(state) = self
            .states
            .lock()
            .get(&snapshot_id)
            .and_then(|m| m.get(unique_id))
        {
            return Ok(state.clone());
        }
        if let Some(path) = self.state_path(snapshot_id, unique_id) {
            if path.exists() {
                return StateFileReader::new(&path).read();
            }
        }
        Err(SnapshotError::NotCaptured {
            snapshot_id,
            operator_id: unique_id.to_string(),
        })
    }

    pub fn status(&self, snapshot_id: u64) -> SnapshotStatus {
        let states = self.states.lock();
        let captured = states.get(&snapshot_id);
        let complete = self
            .components
            .read()
            .iter()
            .all(|c| captured.is_some_and(|m| m.contains_key(c)));
        if complete && captured.is_some() {
            SnapshotStatus::Complete
        } else {
            SnapshotStatus::InProgress
        }
    }

    /// Every state captured for `snapshot_id`, keyed by operator unique id.
    pub fn task_snapshot(&self, snapshot_id: u64) -> Option<BTreeMap<String, OperatorState>> {
        self.states.lock().get(&snapshot_id).cloned()
    }

    pub fn remove_snapshot(&self, snapshot_id: u64) -> Result<(), SnapshotError> {
        self.states.lock().remove(&snapshot_id);
        if let Some(dir) = &self.persist_dir {
            let path = dir
                .join(sanitize(&self.task_id))
                .join(snapshot_id.to_string());
            if path.exists() {
                std::fs::remove_dir_all(path)?;
            }
        }
        Ok(())
    }
}

fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
