use super::{DriverContext, Operator, OperatorContext, OperatorFactory};
use crate::engine::core::page::Page;
use crate::engine::core::serde::PagesSerde;
use crate::engine::core::snapshot::{
    LimitState, OperatorState, Restorable, SingleInputRestorable, SingleInputSnapshotState,
};
use crate::engine::errors::{OperatorError, SnapshotError};

pub struct LimitOperator {
    ctx: OperatorContext,
    remaining: u64,
    next_page: Option<Page>,
    finishing: bool,
    snapshot: SingleInputSnapshotState,
}

impl LimitOperator {
    pub fn new(ctx: OperatorContext, limit: u64) -> Self {
        let snapshot = SingleInputSnapshotState::new(ctx.snapshot_handle());
        Self {
            ctx,
            remaining: limit,
            next_page: None,
            finishing: false,
            snapshot,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Operator for LimitOperator {
    fn operator_context(&self) -> &OperatorContext {
        &self.ctx
    }

    fn needs_input(&self) -> bool {
        !self.finishing && self.remaining > 0 && self.next_page.is_none()
    }

    fn add_input(&mut self, page: Page) -> Result<(), OperatorError> {
        if self.process_snapshot_page(&page)? {
            return Ok(());
        }
        let rows = page.position_count() as u64;
        self.ctx.record_input(page.size_in_bytes(), page.position_count());
        if rows <= self.remaining {
            self.remaining -= rows;
            self.next_page = Some(page);
        } else {
            let kept = page.get_region(0, self.remaining as usize)?;
            self.remaining = 0;
            self.next_page = Some(kept);
        }
        Ok(())
    }

    fn get_output(&mut self) -> Result<Option<Page>, OperatorError> {
        if let Some(marker) = self.snapshot.next_marker() {
            return Ok(Some(marker));
        }
        let page = self.next_page.take();
        if let Some(page) = &page {
            self.ctx
                .record_output(page.size_in_bytes(), page.position_count());
        }
        Ok(page)
    }

    fn finish(&mut self) -> Result<(), OperatorError> {
        self.finishing = true;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        (self.finishing || self.remaining == 0)
            && self.next_page.is_none()
            && !self.snapshot.has_pending_marker()
    }
}

impl Restorable for LimitOperator {
    fn capture(&self, serde: &PagesSerde) -> Result<OperatorState, SnapshotError> {
        let pending = self
            .next_page
            .as_ref()
            .map(|p| serde.serialize(p))
            .transpose()?;
        Ok(OperatorState::Limit(LimitState {
            memory: self.ctx.memory_state(),
            remaining: self.remaining,
            pending,
        }))
    }

    fn restore(&mut self, state: OperatorState, serde: &PagesSerde) -> Result<(), SnapshotError> {
        let OperatorState::Limit(state) = state else {
            return Err(OperatorState::mismatch(self.ctx.unique_id(), "Limit"));
        };
        self.ctx.restore_memory(state.memory)?;
        self.remaining = state.remaining;
        self.next_page = state
            .pending
            .as_ref()
            .map(|p| serde.deserialize(p))
            .transpose()?;
        Ok(())
    }
}

impl SingleInputRestorable for LimitOperator {
    fn snapshot_state(&mut self) -> &mut SingleInputSnapshotState {
        &mut self.snapshot
    }
}

pub struct LimitOperatorFactory {
    operator_id: usize,
    plan_node_id: String,
    limit: u64,
    closed: bool,
}

impl LimitOperatorFactory {
    pub fn new(operator_id: usize, plan_node_id: impl Into<String>, limit: u64) -> Self {
        Self {
            operator_id,
            plan_node_id: plan_node_id.into(),
            limit,
            closed: false,
        }
    }
}

impl OperatorFactory for LimitOperatorFactory {
    fn operator_type(&self) -> &'static str {
        "LimitOperator"
    }

    fn create_operator(&mut self, driver: &DriverContext) -> Result<Box<dyn Operator>, OperatorError> {
        if self.closed {
            return Err(OperatorError::illegal_state("factory is already closed"));
        }
        let ctx = driver.add_operator_context(self.operator_id, &self.plan_node_id, self.operator_type());
        Ok(Box::new(LimitOperator::new(ctx, self.limit)))
    }

    fn no_more_operators(&mut self) {
        self.closed = true;
    }
}
