use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;

use super::{
    Blocked, DriverContext, NOT_BLOCKED, Operator, OperatorContext, OperatorFactory,
    SourceOperator, Split,
};
use crate::engine::core::exchange::{ExchangeClient, ExchangeTransport, LocalExchangeTransport};
use crate::engine::core::page::{MarkerPage, Page};
use crate::engine::core::serde::PagesSerde;
use crate::engine::core::snapshot::{
    ExchangeState, OperatorState, Restorable, SingleInputRestorable, SingleInputSnapshotState,
};
use crate::engine::errors::{OperatorError, SnapshotError};
use crate::shared::config::ExchangeConfig;

/// Source reading the pages of an upstream stage through a shared
/// `ExchangeClient`. Each operator is one target of the client.
pub struct ExchangeOperator {
    ctx: OperatorContext,
    client: ExchangeClient,
    finished: bool,
    snapshot: SingleInputSnapshotState,
}

impl ExchangeOperator {
    pub fn new(ctx: OperatorContext, client: ExchangeClient) -> Result<Self, OperatorError> {
        client.add_target(ctx.unique_id())?;
        let snapshot = SingleInputSnapshotState::new(ctx.snapshot_handle());
        Ok(Self {
            ctx,
            client,
            finished: false,
            snapshot,
        })
    }

    pub fn client(&self) -> &ExchangeClient {
        &self.client
    }
}

impl Operator for ExchangeOperator {
    fn operator_context(&self) -> &OperatorContext {
        &self.ctx
    }

    fn needs_input(&self) -> bool {
        false
    }

    fn add_input(&mut self, _page: Page) -> Result<(), OperatorError> {
        Err(OperatorError::illegal_state("exchange operator takes no input"))
    }

    fn get_output(&mut self) -> Result<Option<Page>, OperatorError> {
        if let Some(marker) = self.snapshot.next_marker() {
            return Ok(Some(marker));
        }
        if self.finished {
            return Ok(None);
        }
        let Some(serialized) = self.client.poll_page(self.ctx.unique_id())? else {
            return Ok(None);
        };

        if serialized.is_marker_page() {
            let marker = MarkerPage::deserialize(serialized.slice())?;
            self.process_snapshot_page(&Page::marker(marker))?;
            return Ok(self.snapshot.next_marker());
        }

        let page = self.ctx.serde().deserialize(&serialized)?;
        self.ctx
            .record_input(serialized.size_in_bytes(), page.position_count());
        self.ctx
            .record_output(page.size_in_bytes(), page.position_count());
        Ok(Some(page))
    }

    fn is_blocked(&self) -> Blocked {
        if self.finished || self.snapshot.has_pending_marker() {
            return NOT_BLOCKED;
        }
        self.client.is_blocked_for(self.ctx.unique_id())
    }

    fn finish(&mut self) -> Result<(), OperatorError> {
        if !self.finished {
            self.finished = true;
            self.client.close_target(self.ctx.unique_id());
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        !self.snapshot.has_pending_marker() && (self.finished || self.client.is_finished())
    }

    fn close(&mut self) -> Result<(), OperatorError> {
        self.finish()?;
        self.ctx.release_memory();
        Ok(())
    }

    fn as_source(&mut self) -> Option<&mut dyn SourceOperator> {
        Some(self)
    }
}

impl SourceOperator for ExchangeOperator {
    fn add_split(&mut self, split: Split) -> Result<(), OperatorError> {
        self.client.add_location(split.location)?;
        Ok(())
    }

    fn no_more_splits(&mut self) {
        self.client.no_more_locations();
    }

    fn inject_marker(&mut self, marker: MarkerPage) -> Result<(), OperatorError> {
        self.process_snapshot_page(&Page::marker(marker))?;
        Ok(())
    }
}

impl Restorable for ExchangeOperator {
    fn capture(&self, _serde: &PagesSerde) -> Result<OperatorState, SnapshotError> {
        Ok(OperatorState::Exchange(ExchangeState {
            memory: self.ctx.memory_state(),
        }))
    }

    /// Only the reservation is rebuilt. Pages after the snapshot are replayed
    /// by the upstream producers resuming from the same marker, so nothing
    /// buffered here is discarded.
    fn restore(&mut self, state: OperatorState, _serde: &PagesSerde) -> Result<(), SnapshotError> {
        let OperatorState::Exchange(state) = state else {
            return Err(OperatorState::mismatch(self.ctx.unique_id(), "Exchange"));
        };
        self.ctx.restore_memory(state.memory)?;
        Ok(())
    }
}

impl SingleInputRestorable for ExchangeOperator {
    fn snapshot_state(&mut self) -> &mut SingleInputSnapshotState {
        &mut self.snapshot
    }
}

/// Creates the exchange operators of one pipeline. All of them share a single
/// client, created with the first operator.
pub struct ExchangeOperatorFactory {
    operator_id: usize,
    plan_node_id: String,
    transport: Arc<dyn ExchangeTransport>,
    config: ExchangeConfig,
    runtime: Handle,
    client: Option<ExchangeClient>,
    closed: bool,
}

impl ExchangeOperatorFactory {
    pub fn new(
        operator_id: usize,
        plan_node_id: impl Into<String>,
        transport: Arc<dyn ExchangeTransport>,
        config: ExchangeConfig,
        runtime: Handle,
    ) -> Self {
        Self {
            operator_id,
            plan_node_id: plan_node_id.into(),
            transport,
            config,
            runtime,
            client: None,
            closed: false,
        }
    }

    pub fn client(&self) -> Option<&ExchangeClient> {
        self.client.as_ref()
    }
}

impl OperatorFactory for ExchangeOperatorFactory {
    fn operator_type(&self) -> &'static str {
        "ExchangeOperator"
    }

    fn create_operator(&mut self, driver: &DriverContext) -> Result<Box<dyn Operator>, OperatorError> {
        if self.closed {
            return Err(OperatorError::illegal_state("factory is already closed"));
        }
        let client = match &self.client {
            Some(client) => client.clone(),
            None => {
                let client = ExchangeClient::new(
                    Arc::clone(&self.transport),
                    self.config.clone(),
                    driver.task().memory().new_local(format!("exchange-{}", self.plan_node_id)),
                    self.runtime.clone(),
                );
                self.client = Some(client.clone());
                client
            }
        };
        let ctx = driver.add_operator_context(self.operator_id, &self.plan_node_id, self.operator_type());
        Ok(Box::new(ExchangeOperator::new(ctx, client)?))
    }

    fn no_more_operators(&mut self) {
        self.closed = true;
        if let Some(client) = &self.client {
            client.no_more_targets();
        }
    }
}

/// Sink publishing every page it receives, markers included, to one location
/// of a `LocalExchangeTransport`.
pub struct ExchangeSinkOperator {
    ctx: OperatorContext,
    transport: Arc<LocalExchangeTransport>,
    location: String,
    finished: bool,
    snapshot: SingleInputSnapshotState,
}

impl ExchangeSinkOperator {
    pub fn new(
        ctx: OperatorContext,
        transport: Arc<LocalExchangeTransport>,
        location: impl Into<String>,
    ) -> Self {
        let snapshot = SingleInputSnapshotState::new(ctx.snapshot_handle());
        Self {
            ctx,
            transport,
            location: location.into(),
            finished: false,
            snapshot,
        }
    }

    fn publish_markers(&mut self) -> Result<(), OperatorError> {
        while let Some(page) = self.snapshot.next_marker() {
            if let Some(marker) = page.as_marker() {
                self.transport
                    .publish(&self.location, &PagesSerde::serialize_marker(marker))?;
            }
        }
        Ok(())
    }
}

impl Operator for ExchangeSinkOperator {
    fn operator_context(&self) -> &OperatorContext {
        &self.ctx
    }

    fn needs_input(&self) -> bool {
        !self.finished
    }

    fn add_input(&mut self, page: Page) -> Result<(), OperatorError> {
        if self.finished {
            return Err(OperatorError::illegal_state("exchange sink is finished"));
        }
        if self.process_snapshot_page(&page)? {
            return self.publish_markers();
        }
        let serialized = self.ctx.serde().serialize(&page)?;
        self.ctx
            .record_input(page.size_in_bytes(), page.position_count());
        self.ctx
            .record_output(serialized.size_in_bytes(), page.position_count());
        self.transport.publish(&self.location, &serialized)?;
        Ok(())
    }

    fn get_output(&mut self) -> Result<Option<Page>, OperatorError> {
        Ok(None)
    }

    fn finish(&mut self) -> Result<(), OperatorError> {
        if !self.finished {
            self.finished = true;
            self.transport.finish_producer(&self.location);
            debug!(target: "snapflow::exchange", location = %self.location, operator = %self.ctx.unique_id(), "Producer finished");
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn close(&mut self) -> Result<(), OperatorError> {
        if !self.finished {
            // Closed before finishing: consumers must not mistake this for a complete stream.
            self.finished = true;
            self.transport.abort_location(&self.location);
        }
        self.ctx.release_memory();
        Ok(())
    }
}

impl Restorable for ExchangeSinkOperator {
    fn capture(&self, _serde: &PagesSerde) -> Result<OperatorState, SnapshotError> {
        Ok(OperatorState::Exchange(ExchangeState {
            memory: self.ctx.memory_state(),
        }))
    }

    fn restore(&mut self, state: OperatorState, _serde: &PagesSerde) -> Result<(), SnapshotError> {
        let OperatorState::Exchange(state) = state else {
            return Err(OperatorState::mismatch(self.ctx.unique_id(), "Exchange"));
        };
        self.ctx.restore_memory(state.memory)?;
        Ok(())
    }
}

impl SingleInputRestorable for ExchangeSinkOperator {
    fn snapshot_state(&mut self) -> &mut SingleInputSnapshotState {
        &mut self.snapshot
    }
}

pub struct ExchangeSinkOperatorFactory {
    operator_id: usize,
    plan_node_id: String,
    transport: Arc<LocalExchangeTransport>,
    location: String,
    closed: bool,
}

impl ExchangeSinkOperatorFactory {
    pub fn new(
        operator_id: usize,
        plan_node_id: impl Into<String>,
        transport: Arc<LocalExchangeTransport>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            operator_id,
            plan_node_id: plan_node_id.into(),
            transport,
            location: location.into(),
            closed: false,
        }
    }
}

impl OperatorFactory for ExchangeSinkOperatorFactory {
    fn operator_type(&self) -> &'static str {
        "ExchangeSinkOperator"
    }

    fn create_operator(&mut self, driver: &DriverContext) -> Result<Box<dyn Operator>, OperatorError> {
        if self.closed {
            return Err(OperatorError::illegal_state("factory is already closed"));
        }
        let ctx = driver.add_operator_context(self.operator_id, &self.plan_node_id, self.operator_type());
        self.transport.add_producer(&self.location);
        Ok(Box::new(ExchangeSinkOperator::new(
            ctx,
            Arc::clone(&self.transport),
            &self.location,
        )))
    }

    fn no_more_operators(&mut self) {
        self.closed = true;
        self.transport.no_more_producers(&self.location);
    }
}
