use tracing::{debug, warn};

use super::{
    Blocked, DriverContext, NOT_BLOCKED, Operator, OperatorFactory, SourceOperator, Split,
};
use crate::engine::core::page::MarkerPage;
use crate::engine::errors::{OperatorError, SnapshotError};

/// Runs one instance of a pipeline: moves pages between adjacent operators
/// until the last one finishes. Every operator is closed on every exit path.
pub struct Driver {
    ctx: DriverContext,
    operators: Vec<Box<dyn Operator>>,
    closed: bool,
}

impl Driver {
    pub fn new(ctx: DriverContext, operators: Vec<Box<dyn Operator>>) -> Result<Self, OperatorError> {
        if operators.is_empty() {
            return Err(OperatorError::illegal_state("driver requires at least one operator"));
        }
        Ok(Self {
            ctx,
            operators,
            closed: false,
        })
    }

    /// Builds the pipeline from its factories. With snapshots enabled every
    /// factory must be restorable.
    pub fn create(
        ctx: DriverContext,
        factories: &mut [Box<dyn OperatorFactory>],
    ) -> Result<Self, OperatorError> {
        if ctx.is_snapshot_enabled() {
            if let Some(factory) = factories.iter().find(|f| !f.is_restorable()) {
                return Err(SnapshotError::NotRestorable(factory.operator_type().to_string()).into());
            }
        }
        let mut operators = Vec::with_capacity(factories.len());
        for factory in factories.iter_mut() {
            match factory.create_operator(&ctx) {
                Ok(operator) => operators.push(operator),
                Err(err) => {
                    for mut created in operators {
                        let _ = created.close();
                    }
                    return Err(err);
                }
            }
        }
        Self::new(ctx, operators)
    }

    pub fn context(&self) -> &DriverContext {
        &self.ctx
    }

    pub fn operators(&self) -> &[Box<dyn Operator>] {
        &self.operators
    }

    fn source(&mut self) -> Result<&mut dyn SourceOperator, OperatorError> {
        self.operators[0]
            .as_source()
            .ok_or_else(|| OperatorError::illegal_state("first operator is not a source"))
    }

    pub fn add_split(&mut self, split: Split) -> Result<(), OperatorError> {
        self.source()?.add_split(split)
    }

    pub fn no_more_splits(&mut self) -> Result<(), OperatorError> {
        self.source()?.no_more_splits();
        Ok(())
    }

    pub fn inject_marker(&mut self, marker: MarkerPage) -> Result<(), OperatorError> {
        debug!(target: "snapflow::driver", snapshot_id = marker.snapshot_id(), resuming = marker.is_resuming(), "Injecting marker");
        self.source()?.inject_marker(marker)
    }

    pub fn is_finished(&self) -> bool {
        self.closed
            || self.ctx.task().cancellation().is_cancelled()
            || self.operators.last().is_some_and(|op| op.is_finished())
    }

    /// One pass over the pipeline. Returns the combined blocked future when
    /// no page moved and some operator is waiting.
    pub fn process(&mut self) -> Result<Blocked, OperatorError> {
        if self.ctx.task().cancellation().is_cancelled() {
            return Err(OperatorError::Cancelled);
        }
        let mut moved = false;
        for i in 0..self.operators.len() - 1 {
            let (head, tail) = self.operators.split_at_mut(i + 1);
            let current = &mut head[i];
            let next = &mut tail[0];

            if !current.is_finished() && !next.is_blocked().is_blocked() && next.needs_input() {
                if let Some(page) = current.get_output()? {
                    if page.is_marker() || page.position_count() > 0 {
                        next.add_input(page)?;
                        moved = true;
                    }
                }
            }

            if current.is_finished() {
                next.finish()?;
            }
        }

        if !moved {
            let blocked: Vec<Blocked> = self
                .operators
                .iter()
                .map(|op| op.is_blocked())
                .filter(Blocked::is_blocked)
                .collect();
            if !blocked.is_empty() {
                return Ok(Blocked::any(blocked));
            }
        }
        Ok(NOT_BLOCKED)
    }

    /// Drives the pipeline to completion on the current tokio runtime.
    pub async fn run(mut self) -> Result<(), OperatorError> {
        let result = self.run_loop().await;
        let closed = self.close();
        if let Err(err) = &result {
            err.log_error();
        }
        result.and(closed)
    }

    async fn run_loop(&mut self) -> Result<(), OperatorError> {
        let token = self.ctx.task().cancellation().clone();
        loop {
            if token.is_cancelled() {
                return Err(OperatorError::Cancelled);
            }
            if self.is_finished() {
                return Ok(());
            }
            match self.process()? {
                Blocked::Waiting(future) => {
                    tokio::select! {
                        _ = future => {}
                        _ = token.cancelled() => return Err(OperatorError::Cancelled),
                    }
                }
                Blocked::NotBlocked => tokio::task::yield_now().await,
            }
        }
    }

    /// Closes every operator, returning the first failure.
    pub fn close(&mut self) -> Result<(), OperatorError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut first_error = None;
        for operator in self.operators.iter_mut() {
            if let Err(err) = operator.close() {
                warn!(target: "snapflow::driver", operator = %operator.operator_context().unique_id(), error = %err, "Failed to close operator");
                first_error.get_or_insert(err);
            }
        }
        debug!(target: "snapflow::driver", pipeline = self.ctx.pipeline_id(), driver = self.ctx.driver_id(), "Driver closed");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
