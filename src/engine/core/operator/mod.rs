pub mod blocked;
pub mod cancellation;
pub mod context;
pub mod driver;
pub mod exchange;
pub mod filter_project;
pub mod limit;
pub mod page_consumer;
pub mod topn;
pub mod values;
pub mod window;

#[cfg(test)]
mod blocked_test;
#[cfg(test)]
mod filter_project_test;
#[cfg(test)]
mod limit_test;

pub use blocked::{Blocked, BlockedFuture, NOT_BLOCKED, SettableBlocked};
pub use cancellation::CancellationToken;
pub use context::{DriverContext, OperatorContext, OperatorStats, TaskContext};
pub use driver::Driver;
pub use exchange::{ExchangeOperator, ExchangeOperatorFactory, ExchangeSinkOperator, ExchangeSinkOperatorFactory};
pub use filter_project::{
    FilterAndProjectProcessor, FilterProjectOperator, FilterProjectOperatorFactory, PageProcessor,
    RowFilter,
};
pub use limit::{LimitOperator, LimitOperatorFactory};
pub use page_consumer::{PageCollector, PageConsumerOperator, PageConsumerOperatorFactory};
pub use topn::{TopNOperator, TopNOperatorFactory};
pub use values::{ValuesOperator, ValuesOperatorFactory};
pub use window::{WindowOperator, WindowOperatorFactory};

use crate::engine::core::page::{MarkerPage, Page};
use crate::engine::errors::OperatorError;

/// Pull-based, non-blocking operator driven by a single `Driver` thread.
pub trait Operator: Send {
    fn operator_context(&self) -> &OperatorContext;

    fn needs_input(&self) -> bool;

    fn add_input(&mut self, page: Page) -> Result<(), OperatorError>;

    fn get_output(&mut self) -> Result<Option<Page>, OperatorError>;

    fn is_blocked(&self) -> Blocked {
        NOT_BLOCKED
    }

    /// No more input will arrive.
    fn finish(&mut self) -> Result<(), OperatorError>;

    fn is_finished(&self) -> bool;

    fn close(&mut self) -> Result<(), OperatorError> {
        self.operator_context().release_memory();
        Ok(())
    }

    fn as_source(&mut self) -> Option<&mut dyn SourceOperator> {
        None
    }
}

/// A unit of input for a source operator, e.g. a remote producer location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub location: String,
}

impl Split {
    pub fn remote(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

pub trait SourceOperator: Operator {
    fn add_split(&mut self, split: Split) -> Result<(), OperatorError>;

    fn no_more_splits(&mut self);

    /// Queues a marker injected by the coordinator ahead of further output.
    fn inject_marker(&mut self, marker: MarkerPage) -> Result<(), OperatorError>;
}

/// Creates one operator per driver of a pipeline.
pub trait OperatorFactory: Send {
    fn operator_type(&self) -> &'static str;

    fn create_operator(&mut self, driver: &DriverContext) -> Result<Box<dyn Operator>, OperatorError>;

    fn no_more_operators(&mut self);

    fn is_restorable(&self) -> bool {
        true
    }
}
