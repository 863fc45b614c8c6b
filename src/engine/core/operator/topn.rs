use super::{DriverContext, Operator, OperatorContext, OperatorFactory};
use crate::engine::core::page::Page;
use crate::engine::core::serde::PagesSerde;
use crate::engine::core::snapshot::state::{deserialize_pages, serialize_pages};
use crate::engine::core::snapshot::{
    OperatorState, Restorable, SingleInputRestorable, SingleInputSnapshotState, TopNState,
};
use crate::engine::core::topn::{TopNProcessor, TopNSpec};
use crate::engine::errors::{OperatorError, SnapshotError};

pub struct TopNOperator {
    ctx: OperatorContext,
    processor: TopNProcessor,
    snapshot: SingleInputSnapshotState,
}

impl TopNOperator {
    pub fn new(ctx: OperatorContext, spec: TopNSpec) -> Result<Self, OperatorError> {
        let snapshot = SingleInputSnapshotState::new(ctx.snapshot_handle());
        Ok(Self {
            ctx,
            processor: TopNProcessor::new(spec)?,
            snapshot,
        })
    }
}

impl Operator for TopNOperator {
    fn operator_context(&self) -> &OperatorContext {
        &self.ctx
    }

    fn needs_input(&self) -> bool {
        !self.processor.is_finishing() && !self.processor.is_finished()
    }

    fn add_input(&mut self, page: Page) -> Result<(), OperatorError> {
        if self.process_snapshot_page(&page)? {
            return Ok(());
        }
        self.ctx.record_input(page.size_in_bytes(), page.position_count());
        let ctx = &self.ctx;
        self.processor.add_input(&page, |bytes| {
            ctx.set_user_memory(bytes).map_err(OperatorError::from)
        })
    }

    fn get_output(&mut self) -> Result<Option<Page>, OperatorError> {
        if let Some(marker) = self.snapshot.next_marker() {
            return Ok(Some(marker));
        }
        let page = self.processor.get_output()?;
        match &page {
            Some(page) => self
                .ctx
                .record_output(page.size_in_bytes(), page.position_count()),
            None if self.processor.is_finished() => self.ctx.set_user_memory(0)?,
            None => {}
        }
        Ok(page)
    }

    fn finish(&mut self) -> Result<(), OperatorError> {
        self.processor.finish()
    }

    fn is_finished(&self) -> bool {
        self.processor.is_finished() && !self.snapshot.has_pending_marker()
    }
}

impl Restorable for TopNOperator {
    fn capture(&self, serde: &PagesSerde) -> Result<OperatorState, SnapshotError> {
        let rows = self.processor.retained_pages()?;
        Ok(OperatorState::TopN(TopNState {
            memory: self.ctx.memory_state(),
            rows: serialize_pages(serde, &rows)?,
            finishing: self.processor.is_finishing(),
        }))
    }

    fn restore(&mut self, state: OperatorState, serde: &PagesSerde) -> Result<(), SnapshotError> {
        let OperatorState::TopN(state) = state else {
            return Err(OperatorState::mismatch(self.ctx.unique_id(), "TopN"));
        };
        let rows = deserialize_pages(serde, &state.rows)?;
        self.processor
            .restore(&rows, state.finishing)
            .map_err(|e| SnapshotError::Restore(e.to_string()))?;
        self.ctx.restore_memory(state.memory)?;
        Ok(())
    }
}

impl SingleInputRestorable for TopNOperator {
    fn snapshot_state(&mut self) -> &mut SingleInputSnapshotState {
        &mut self.snapshot
    }
}

pub struct TopNOperatorFactory {
    operator_id: usize,
    plan_node_id: String,
    spec: TopNSpec,
    closed: bool,
}

impl TopNOperatorFactory {
    pub fn new(operator_id: usize, plan_node_id: impl Into<String>, spec: TopNSpec) -> Self {
        Self {
            operator_id,
            plan_node_id: plan_node_id.into(),
            spec,
            closed: false,
        }
    }
}

impl OperatorFactory for TopNOperatorFactory {
    fn operator_type(&self) -> &'static str {
        "TopNOperator"
    }

    fn create_operator(&mut self, driver: &DriverContext) -> Result<Box<dyn Operator>, OperatorError> {
        if self.closed {
            return Err(OperatorError::illegal_state("factory is already closed"));
        }
        let ctx = driver.add_operator_context(self.operator_id, &self.plan_node_id, self.operator_type());
        let spec = self
            .spec
            .clone()
            .with_max_page_positions(driver.max_page_positions());
        Ok(Box::new(TopNOperator::new(ctx, spec)?))
    }

    fn no_more_operators(&mut self) {
        self.closed = true;
    }
}
