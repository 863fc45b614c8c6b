use std::sync::Arc;

use parking_lot::Mutex;

use super::{DriverContext, Operator, OperatorContext, OperatorFactory};
use crate::engine::core::page::Page;
use crate::engine::errors::OperatorError;

/// Shared sink for pages leaving a pipeline, markers included.
#[derive(Debug, Clone, Default)]
pub struct PageCollector {
    pages: Arc<Mutex<Vec<Page>>>,
}

impl PageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, page: Page) {
        self.pages.lock().push(page);
    }

    /// Everything received so far, in arrival order.
    pub fn pages(&self) -> Vec<Page> {
        self.pages.lock().clone()
    }

    pub fn data_pages(&self) -> Vec<Page> {
        self.pages
            .lock()
            .iter()
            .filter(|p| !p.is_marker())
            .cloned()
            .collect()
    }
}

/// Terminal operator handing every page to a `PageCollector`.
pub struct PageConsumerOperator {
    ctx: OperatorContext,
    collector: PageCollector,
    finished: bool,
}

impl PageConsumerOperator {
    pub fn new(ctx: OperatorContext, collector: PageCollector) -> Self {
        Self {
            ctx,
            collector,
            finished: false,
        }
    }
}

impl Operator for PageConsumerOperator {
    fn operator_context(&self) -> &OperatorContext {
        &self.ctx
    }

    fn needs_input(&self) -> bool {
        !self.finished
    }

    fn add_input(&mut self, page: Page) -> Result<(), OperatorError> {
        if !page.is_marker() {
            self.ctx.record_input(page.size_in_bytes(), page.position_count());
        }
        self.collector.push(page);
        Ok(())
    }

    fn get_output(&mut self) -> Result<Option<Page>, OperatorError> {
        Ok(None)
    }

    fn finish(&mut self) -> Result<(), OperatorError> {
        self.finished = true;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

pub struct PageConsumerOperatorFactory {
    operator_id: usize,
    plan_node_id: String,
    collector: PageCollector,
}

impl PageConsumerOperatorFactory {
    pub fn new(operator_id: usize, plan_node_id: impl Into<String>, collector: PageCollector) -> Self {
        Self {
            operator_id,
            plan_node_id: plan_node_id.into(),
            collector,
        }
    }
}

impl OperatorFactory for PageConsumerOperatorFactory {
    fn operator_type(&self) -> &'static str {
        "PageConsumerOperator"
    }

    fn create_operator(&mut self, driver: &DriverContext) -> Result<Box<dyn Operator>, OperatorError> {
        let ctx = driver.add_operator_context(self.operator_id, &self.plan_node_id, self.operator_type());
        Ok(Box::new(PageConsumerOperator::new(ctx, self.collector.clone())))
    }

    fn no_more_operators(&mut self) {}
}
