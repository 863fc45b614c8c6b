use std::sync::Arc;

use tracing::debug;

use super::cancellation::CancellationToken;
use crate::engine::core::memory::{AggregatedMemoryContext, LocalMemoryContext};
use crate::engine::core::serde::PagesSerde;
use crate::engine::core::snapshot::{MemoryState, SnapshotHandle, SnapshotStore};
use crate::engine::errors::MemoryError;
use crate::shared::config::{ExecutionConfig, Settings};

/// Per-task state shared by every driver: memory root, snapshot store,
/// page serde and the cancellation token.
#[derive(Debug)]
pub struct TaskContext {
    task_id: String,
    memory: AggregatedMemoryContext,
    snapshot_store: Arc<SnapshotStore>,
    serde: PagesSerde,
    cancellation: CancellationToken,
    snapshot_enabled: bool,
    execution: ExecutionConfig,
}

impl TaskContext {
    pub fn new(task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        Self {
            memory: AggregatedMemoryContext::new_root(format!("task-{task_id}"), None),
            snapshot_store: Arc::new(SnapshotStore::new(task_id.clone())),
            task_id,
            serde: PagesSerde::default(),
            cancellation: CancellationToken::new(),
            snapshot_enabled: false,
            execution: ExecutionConfig::default(),
        }
    }

    pub fn from_settings(task_id: impl Into<String>, settings: &Settings) -> Self {
        let task_id = task_id.into();
        Self::new(task_id.clone())
            .with_memory_limit(Some(settings.memory.query_max_memory_bytes))
            .with_snapshot_store(Arc::new(SnapshotStore::from_config(
                task_id,
                &settings.snapshot,
            )))
            .with_snapshot_enabled(settings.snapshot.enabled)
            .with_execution(settings.execution.clone())
    }

    pub fn with_memory_limit(mut self, limit: Option<u64>) -> Self {
        self.memory = AggregatedMemoryContext::new_root(format!("task-{}", self.task_id), limit);
        self
    }

    pub fn with_snapshot_store(mut self, store: Arc<SnapshotStore>) -> Self {
        self.snapshot_store = store;
        self
    }

    pub fn with_snapshot_enabled(mut self, enabled: bool) -> Self {
        self.snapshot_enabled = enabled;
        self
    }

    pub fn with_serde(mut self, serde: PagesSerde) -> Self {
        self.serde = serde;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn memory(&self) -> &AggregatedMemoryContext {
        &self.memory
    }

    pub fn snapshot_store(&self) -> &Arc<SnapshotStore> {
        &self.snapshot_store
    }

    pub fn serde(&self) -> &PagesSerde {
        &self.serde
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_snapshot_enabled(&self) -> bool {
        self.snapshot_enabled
    }

    pub fn execution(&self) -> &ExecutionConfig {
        &self.execution
    }

    pub fn add_driver_context(self: &Arc<Self>, pipeline_id: usize, driver_id: usize) -> DriverContext {
        DriverContext {
            memory: self
                .memory
                .new_child(format!("pipeline-{pipeline_id}-driver-{driver_id}")),
            task: Arc::clone(self),
            pipeline_id,
            driver_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriverContext {
    task: Arc<TaskContext>,
    pipeline_id: usize,
    driver_id: usize,
    memory: AggregatedMemoryContext,
}

impl DriverContext {
    pub fn task(&self) -> &Arc<TaskContext> {
        &self.task
    }

    pub fn pipeline_id(&self) -> usize {
        self.pipeline_id
    }

    pub fn driver_id(&self) -> usize {
        self.driver_id
    }

    pub fn memory(&self) -> &AggregatedMemoryContext {
        &self.memory
    }

    pub fn is_snapshot_enabled(&self) -> bool {
        self.task.is_snapshot_enabled()
    }

    pub fn serde(&self) -> &PagesSerde {
        self.task.serde()
    }

    pub fn max_page_positions(&self) -> usize {
        self.task.execution().max_page_positions
    }

    pub fn add_operator_context(
        &self,
        operator_id: usize,
        plan_node_id: impl Into<String>,
        operator_type: &'static str,
    ) -> OperatorContext {
        let unique_id = format!("{}-{}-{}", self.pipeline_id, self.driver_id, operator_id);
        let memory = self.memory.new_child(format!("{operator_type}-{unique_id}"));
        OperatorContext {
            user_memory: memory.new_local("user"),
            system_memory: memory.new_local("system"),
            memory,
            operator_id,
            plan_node_id: plan_node_id.into(),
            operator_type,
            unique_id,
            driver: self.clone(),
            stats: OperatorStats::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperatorStats {
    pub input_positions: u64,
    pub input_bytes: u64,
    pub output_positions: u64,
    pub output_bytes: u64,
}

#[derive(Debug)]
pub struct OperatorContext {
    operator_id: usize,
    plan_node_id: String,
    operator_type: &'static str,
    unique_id: String,
    driver: DriverContext,
    memory: AggregatedMemoryContext,
    user_memory: LocalMemoryContext,
    system_memory: LocalMemoryContext,
    stats: OperatorStats,
}

impl OperatorContext {
    pub fn operator_id(&self) -> usize {
        self.operator_id
    }

    pub fn plan_node_id(&self) -> &str {
        &self.plan_node_id
    }

    pub fn operator_type(&self) -> &'static str {
        self.operator_type
    }

    /// Identity of this operator instance within its task.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn driver_context(&self) -> &DriverContext {
        &self.driver
    }

    pub fn serde(&self) -> &PagesSerde {
        self.driver.serde()
    }

    pub fn is_cancelled(&self) -> bool {
        self.driver.task().cancellation().is_cancelled()
    }

    /// Registers this operator with the task's snapshot store and returns its
    /// handle, or `None` when snapshots are disabled.
    pub fn snapshot_handle(&self) -> Option<SnapshotHandle> {
        if !self.driver.is_snapshot_enabled() {
            return None;
        }
        let task = self.driver.task();
        task.snapshot_store().register_component(&self.unique_id);
        Some(SnapshotHandle::new(
            self.unique_id.clone(),
            Arc::clone(task.snapshot_store()),
            task.serde().clone(),
        ))
    }

    /// Operator-level memory node; spillers and exchange buffers hang their
    /// own reservations off it.
    pub fn memory(&self) -> &AggregatedMemoryContext {
        &self.memory
    }

    pub fn set_user_memory(&self, bytes: u64) -> Result<(), MemoryError> {
        self.user_memory.set_bytes(bytes)
    }

    pub fn try_set_user_memory(&self, bytes: u64) -> bool {
        self.user_memory.try_set_bytes(bytes)
    }

    pub fn user_memory_bytes(&self) -> u64 {
        self.user_memory.bytes()
    }

    pub fn set_system_memory(&self, bytes: u64) -> Result<(), MemoryError> {
        self.system_memory.set_bytes(bytes)
    }

    pub fn system_memory_bytes(&self) -> u64 {
        self.system_memory.bytes()
    }

    pub fn memory_state(&self) -> MemoryState {
        MemoryState {
            user_bytes: self.user_memory.bytes(),
            system_bytes: self.system_memory.bytes(),
        }
    }

    pub fn restore_memory(&self, state: MemoryState) -> Result<(), MemoryError> {
        self.user_memory.set_bytes(state.user_bytes)?;
        self.system_memory.set_bytes(state.system_bytes)
    }

    /// Releases every reservation held by this operator.
    pub fn release_memory(&self) {
        self.user_memory.close();
        self.system_memory.close();
        debug!(target: "snapflow::operator", operator = %self.unique_id, "Released operator memory");
    }

    pub fn record_input(&mut self, bytes: u64, positions: usize) {
        self.stats.input_bytes += bytes;
        self.stats.input_positions += positions as u64;
    }

    pub fn record_output(&mut self, bytes: u64, positions: usize) {
        self.stats.output_bytes += bytes;
        self.stats.output_positions += positions as u64;
    }

    pub fn stats(&self) -> OperatorStats {
        self.stats
    }
}
