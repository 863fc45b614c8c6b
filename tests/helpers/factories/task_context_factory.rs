use std::sync::Arc;

use crate::engine::core::operator::{DriverContext, OperatorContext, TaskContext};
use crate::engine::core::serde::PagesSerde;
use crate::engine::core::snapshot::SnapshotStore;
use crate::shared::config::ExecutionConfig;

pub struct TaskContextFactory {
    task_id: String,
    memory_limit: Option<u64>,
    snapshot_enabled: bool,
    serde: PagesSerde,
    max_page_positions: Option<usize>,
}

impl TaskContextFactory {
    pub fn new() -> Self {
        Self {
            task_id: "task-0".into(),
            memory_limit: None,
            snapshot_enabled: false,
            serde: PagesSerde::default(),
            max_page_positions: None,
        }
    }

    pub fn with_task_id(mut self, task_id: &str) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_memory_limit(mut self, limit: u64) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    pub fn with_snapshots(mut self) -> Self {
        self.snapshot_enabled = true;
        self
    }

    pub fn with_serde(mut self, serde: PagesSerde) -> Self {
        self.serde = serde;
        self
    }

    pub fn with_max_page_positions(mut self, positions: usize) -> Self {
        self.max_page_positions = Some(positions);
        self
    }

    pub fn create(self) -> Arc<TaskContext> {
        let mut execution = ExecutionConfig::default();
        if let Some(positions) = self.max_page_positions {
            execution.max_page_positions = positions;
        }
        Arc::new(
            TaskContext::new(self.task_id.clone())
                .with_memory_limit(self.memory_limit)
                .with_snapshot_store(Arc::new(SnapshotStore::new(self.task_id)))
                .with_snapshot_enabled(self.snapshot_enabled)
                .with_serde(self.serde)
                .with_execution(execution),
        )
    }

    pub fn driver(self) -> DriverContext {
        self.create().add_driver_context(0, 0)
    }

    pub fn operator(self, operator_type: &'static str) -> OperatorContext {
        self.driver().add_operator_context(0, "plan-0", operator_type)
    }
}
