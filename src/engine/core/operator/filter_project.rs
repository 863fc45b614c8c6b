use std::sync::Arc;

use super::{DriverContext, Operator, OperatorContext, OperatorFactory};
use crate::engine::core::page::Page;
use crate::engine::errors::OperatorError;

/// Row predicate evaluated against one position of a page.
pub type RowFilter = Arc<dyn Fn(&Page, usize) -> Result<bool, OperatorError> + Send + Sync>;

/// Opaque page-at-a-time evaluator. `None` means every row was filtered out.
pub trait PageProcessor: Send + Sync {
    fn process(&self, page: &Page) -> Result<Option<Page>, OperatorError>;
}

/// Keeps the rows accepted by `filter` and outputs the `projections` channels.
pub struct FilterAndProjectProcessor {
    filter: Option<RowFilter>,
    projections: Vec<usize>,
}

impl FilterAndProjectProcessor {
    pub fn new(filter: Option<RowFilter>, projections: Vec<usize>) -> Self {
        Self {
            filter,
            projections,
        }
    }
}

impl PageProcessor for FilterAndProjectProcessor {
    fn process(&self, page: &Page) -> Result<Option<Page>, OperatorError> {
        let page = match &self.filter {
            None => page.clone(),
            Some(filter) => {
                let mut selected = Vec::with_capacity(page.position_count());
                for position in 0..page.position_count() {
                    if filter(page, position)? {
                        selected.push(position);
                    }
                }
                if selected.is_empty() {
                    return Ok(None);
                }
                if selected.len() == page.position_count() {
                    page.clone()
                } else {
                    page.copy_positions(&selected)?
                }
            }
        };
        Ok(Some(page.get_columns(&self.projections)?))
    }
}

/// Stateless operator: applies a page processor and forwards markers as is.
pub struct FilterProjectOperator {
    ctx: OperatorContext,
    processor: Arc<dyn PageProcessor>,
    output: Option<Page>,
    finishing: bool,
}

impl FilterProjectOperator {
    pub fn new(ctx: OperatorContext, processor: Arc<dyn PageProcessor>) -> Self {
        Self {
            ctx,
            processor,
            output: None,
            finishing: false,
        }
    }
}

impl Operator for FilterProjectOperator {
    fn operator_context(&self) -> &OperatorContext {
        &self.ctx
    }

    fn needs_input(&self) -> bool {
        !self.finishing && self.output.is_none()
    }

    fn add_input(&mut self, page: Page) -> Result<(), OperatorError> {
        if page.is_marker() {
            self.output = Some(page);
            return Ok(());
        }
        if self.ctx.is_cancelled() {
            return Err(OperatorError::Cancelled);
        }
        self.ctx.record_input(page.size_in_bytes(), page.position_count());
        self.output = self.processor.process(&page)?;
        Ok(())
    }

    fn get_output(&mut self) -> Result<Option<Page>, OperatorError> {
        let page = self.output.take();
        if let Some(page) = page.as_ref().filter(|p| !p.is_marker()) {
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
        self.finishing && self.output.is_none()
    }
}

pub struct FilterProjectOperatorFactory {
    operator_id: usize,
    plan_node_id: String,
    processor: Arc<dyn PageProcessor>,
    closed: bool,
}

impl FilterProjectOperatorFactory {
    pub fn new(
        operator_id: usize,
        plan_node_id: impl Into<String>,
        processor: Arc<dyn PageProcessor>,
    ) -> Self {
        Self {
            operator_id,
            plan_node_id: plan_node_id.into(),
            processor,
            closed: false,
        }
    }
}

impl OperatorFactory for FilterProjectOperatorFactory {
    fn operator_type(&self) -> &'static str {
        "FilterProjectOperator"
    }

    fn create_operator(&mut self, driver: &DriverContext) -> Result<Box<dyn Operator>, OperatorError> {
        if self.closed {
            return Err(OperatorError::illegal_state("factory is already closed"));
        }
        let ctx = driver.add_operator_context(self.operator_id, &self.plan_node_id, self.operator_type());
        Ok(Box::new(FilterProjectOperator::new(
            ctx,
            Arc::clone(&self.processor),
        )))
    }

    fn no_more_operators(&mut self) {
        self.closed = true;
    }
}
