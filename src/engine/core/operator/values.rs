use super::{DriverContext, Operator, OperatorContext, OperatorFactory, SourceOperator, Split};
use crate::engine::core::page::{MarkerPage, Page};
use crate::engine::core::serde::PagesSerde;
use crate::engine::core::snapshot::{
    OperatorState, Restorable, SingleInputRestorable, SingleInputSnapshotState, ValuesState,
};
use crate::engine::errors::{OperatorError, SnapshotError};

/// Source that emits a fixed list of pages.
pub struct ValuesOperator {
    ctx: OperatorContext,
    pages: Vec<Page>,
    next_page: usize,
    snapshot: SingleInputSnapshotState,
}

impl ValuesOperator {
    pub fn new(ctx: OperatorContext, pages: Vec<Page>) -> Self {
        let snapshot = SingleInputSnapshotState::new(ctx.snapshot_handle());
        Self {
            ctx,
            pages,
            next_page: 0,
            snapshot,
        }
    }
}

impl Operator for ValuesOperator {
    fn operator_context(&self) -> &OperatorContext {
        &self.ctx
    }

    fn needs_input(&self) -> bool {
        false
    }

    fn add_input(&mut self, _page: Page) -> Result<(), OperatorError> {
        Err(OperatorError::illegal_state("values operator takes no input"))
    }

    fn get_output(&mut self) -> Result<Option<Page>, OperatorError> {
        if let Some(marker) = self.snapshot.next_marker() {
            return Ok(Some(marker));
        }
        let Some(page) = self.pages.get(self.next_page).cloned() else {
            return Ok(None);
        };
        self.next_page += 1;
        self.ctx
            .record_output(page.size_in_bytes(), page.position_count());
        Ok(Some(page))
    }

    fn finish(&mut self) -> Result<(), OperatorError> {
        self.next_page = self.pages.len();
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.next_page >= self.pages.len() && !self.snapshot.has_pending_marker()
    }

    fn as_source(&mut self) -> Option<&mut dyn SourceOperator> {
        Some(self)
    }
}

impl SourceOperator for ValuesOperator {
    fn add_split(&mut self, _split: Split) -> Result<(), OperatorError> {
        Err(OperatorError::illegal_state("values operator takes no splits"))
    }

    fn no_more_splits(&mut self) {}

    fn inject_marker(&mut self, marker: MarkerPage) -> Result<(), OperatorError> {
        self.process_snapshot_page(&Page::marker(marker))?;
        Ok(())
    }
}

impl Restorable for ValuesOperator {
    fn capture(&self, _serde: &PagesSerde) -> Result<OperatorState, SnapshotError> {
        Ok(OperatorState::Values(ValuesState {
            memory: self.ctx.memory_state(),
            next_page: self.next_page as u64,
        }))
    }

    fn restore(&mut self, state: OperatorState, _serde: &PagesSerde) -> Result<(), SnapshotError> {
        let OperatorState::Values(state) = state else {
            return Err(OperatorState::mismatch(self.ctx.unique_id(), "Values"));
        };
        self.ctx.restore_memory(state.memory)?;
        self.next_page = state.next_page as usize;
        Ok(())
    }
}

impl SingleInputRestorable for ValuesOperator {
    fn snapshot_state(&mut self) -> &mut SingleInputSnapshotState {
        &mut self.snapshot
    }
}

pub struct ValuesOperatorFactory {
    operator_id: usize,
    plan_node_id: String,
    pages: Vec<Page>,
    closed: bool,
}

impl ValuesOperatorFactory {
    pub fn new(operator_id: usize, plan_node_id: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            operator_id,
            plan_node_id: plan_node_id.into(),
            pages,
            closed: false,
        }
    }
}

impl OperatorFactory for ValuesOperatorFactory {
    fn operator_type(&self) -> &'static str {
        "ValuesOperator"
    }

    fn create_operator(&mut self, driver: &DriverContext) -> Result<Box<dyn Operator>, OperatorError> {
        if self.closed {
            return Err(OperatorError::illegal_state("factory is already closed"));
        }
        let ctx = driver.add_operator_context(self.operator_id, &self.plan_node_id, self.operator_type());
        Ok(Box::new(ValuesOperator::new(ctx, self.pages.clone())))
    }

    fn no_more_operators(&mut self) {
        self.closed = true;
    }
}
