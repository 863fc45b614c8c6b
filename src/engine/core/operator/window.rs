use std::sync::Arc;

use tracing::{debug, info};

use super::{Blocked, DriverContext, NOT_BLOCKED, Operator, OperatorContext, OperatorFactory};
use crate::engine::core::page::page_builder::DEFAULT_MAX_PAGE_POSITIONS;
use crate::engine::core::page::{MergeSortedPages, Page, PageBuilder, PagesIndex, RowComparator};
use crate::engine::core::serde::PagesSerde;
use crate::engine::core::snapshot::state::{deserialize_pages, serialize_pages};
use crate::engine::core::snapshot::{
    OperatorState, Restorable, SingleInputRestorable, SingleInputSnapshotState, WindowState,
};
use crate::engine::core::spill::{
    FileSingleStreamSpiller, SingleStreamSpiller, SpillFuture, SpillerFactory,
};
use crate::engine::core::window::{FramedWindowFunction, WindowFunctionDefinition, WindowPartition};
use crate::engine::errors::{OperatorError, PageError, SnapshotError, WindowError};
use crate::engine::types::{SortOrder, Type};

/// Plan-level description of a window operator.
#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub types: Vec<Type>,
    pub output_channels: Vec<usize>,
    pub partition_channels: Vec<usize>,
    pub sort_channels: Vec<usize>,
    pub sort_orders: Vec<SortOrder>,
    pub functions: Vec<WindowFunctionDefinition>,
    pub max_page_positions: usize,
}

impl WindowSpec {
    pub fn new(types: Vec<Type>, output_channels: Vec<usize>) -> Self {
        Self {
            types,
            output_channels,
            partition_channels: Vec::new(),
            sort_channels: Vec::new(),
            sort_orders: Vec::new(),
            functions: Vec::new(),
            max_page_positions: DEFAULT_MAX_PAGE_POSITIONS,
        }
    }

    pub fn partitioned_by(mut self, channels: Vec<usize>) -> Self {
        self.partition_channels = channels;
        self
    }

    pub fn ordered_by(mut self, channels: Vec<usize>, orders: Vec<SortOrder>) -> Self {
        self.sort_channels = channels;
        self.sort_orders = orders;
        self
    }

    pub fn with_function(mut self, function: WindowFunctionDefinition) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_max_page_positions(mut self, max_page_positions: usize) -> Self {
        self.max_page_positions = max_page_positions;
        self
    }

    /// Partition keys ascending with nulls first, then the order keys.
    fn comparator(&self) -> Result<RowComparator, OperatorError> {
        let mut channels = self.partition_channels.clone();
        channels.extend(&self.sort_channels);
        let mut orders = vec![SortOrder::AscNullsFirst; self.partition_channels.len()];
        orders.extend(&self.sort_orders);
        Ok(RowComparator::for_channels(&self.types, channels, orders)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NeedsInput,
    HasOutput,
    Finished,
}

type SortedRun = Box<dyn Iterator<Item = Result<Page, OperatorError>> + Send>;

/// Splits a merged, sorted stream back into one partition at a time.
struct SpilledPartitions {
    merged: MergeSortedPages<SortedRun, OperatorError>,
    carry: Option<Page>,
}

impl SpilledPartitions {
    fn next_page(&mut self) -> Result<Option<Page>, OperatorError> {
        if let Some(page) = self.carry.take() {
            return Ok(Some(page));
        }
        self.merged.next().transpose()
    }

    /// Loads every row of the next partition into a fresh index.
    fn next_partition(
        &mut self,
        types: &[Type],
        partition_channels: &[usize],
    ) -> Result<Option<PagesIndex>, OperatorError> {
        let Some(first) = self.next_page()? else {
            return Ok(None);
        };
        let key = first.get_region(0, 1)?;
        let mut index = PagesIndex::new(types.to_vec(), first.position_count());
        let mut page = first;
        loop {
            let same = leading_rows_matching(&key, &page, types, partition_channels)?;
            if same < page.position_count() {
                if same > 0 {
                    index.add_page(&page.get_region(0, same)?)?;
                }
                self.carry = Some(page.get_region(same, page.position_count() - same)?);
                return Ok(Some(index));
            }
            index.add_page(&page)?;
            match self.next_page()? {
                Some(next) => page = next,
                None => return Ok(Some(index)),
            }
        }
    }
}

fn leading_rows_matching(
    key: &Page,
    page: &Page,
    types: &[Type],
    channels: &[usize],
) -> Result<usize, PageError> {
    for position in 0..page.position_count() {
        for &channel in channels {
            let equal = types[channel].equal(key.block(channel)?, 0, page.block(channel)?, position)?;
            if !equal {
                return Ok(position);
            }
        }
    }
    Ok(page.position_count())
}

struct WindowSpill {
    factory: Arc<SpillerFactory>,
    spillers: Vec<FileSingleStreamSpiller>,
    pending: Option<SpillFuture>,
}

impl WindowSpill {
    fn is_spilling(&self) -> bool {
        self.pending.as_ref().is_some_and(|spill| !spill.is_done())
    }

    /// Surfaces the outcome of the last finished spill.
    fn check_pending(&mut self) -> Result<(), OperatorError> {
        if self.is_spilling() {
            return Ok(());
        }
        match self.pending.take().and_then(|spill| spill.result()) {
            Some(Err(err)) => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Buffers its whole input, sorts it by partition and order keys, then emits
/// every row with the window function values appended.
pub struct WindowOperator {
    ctx: OperatorContext,
    spec: WindowSpec,
    functions: Vec<FramedWindowFunction>,
    comparator: RowComparator,
    index: PagesIndex,
    builder: PageBuilder,
    partition: Option<WindowPartition>,
    spilled: Option<SpilledPartitions>,
    spill: Option<WindowSpill>,
    state: State,
    snapshot: SingleInputSnapshotState,
}

impl WindowOperator {
    pub fn new(
        ctx: OperatorContext,
        spec: WindowSpec,
        spiller_factory: Option<Arc<SpillerFactory>>,
    ) -> Result<Self, OperatorError> {
        let functions = spec
            .functions
            .iter()
            .map(|definition| definition.create(&spec.types))
            .collect::<Result<Vec<_>, WindowError>>()?;
        let mut output_types = spec
            .output_channels
            .iter()
            .map(|channel| {
                spec.types
                    .get(*channel)
                    .copied()
                    .ok_or(PageError::ChannelOutOfBounds(*channel))
            })
            .collect::<Result<Vec<_>, _>>()?;
        output_types.extend(functions.iter().map(FramedWindowFunction::output_type));

        let snapshot = if spiller_factory.is_some() {
            SingleInputSnapshotState::default()
        } else {
            SingleInputSnapshotState::new(ctx.snapshot_handle())
        };
        Ok(Self {
            comparator: spec.comparator()?,
            index: PagesIndex::new(spec.types.clone(), spec.max_page_positions),
            builder: PageBuilder::with_limits(output_types, spec.max_page_positions, u64::MAX),
            functions,
            partition: None,
            spilled: None,
            spill: spiller_factory.map(|factory| WindowSpill {
                factory,
                spillers: Vec::new(),
                pending: None,
            }),
            state: State::NeedsInput,
            snapshot,
            spec,
            ctx,
        })
    }

    pub fn spilled_run_count(&self) -> usize {
        self.spill.as_ref().map_or(0, |spill| spill.spillers.len())
    }

    fn is_spilling(&self) -> bool {
        self.spill.as_ref().is_some_and(WindowSpill::is_spilling)
    }

    fn update_memory(&mut self) -> Result<(), OperatorError> {
        let bytes = self.index.estimated_size_in_bytes();
        if self.spill.is_none() {
            return Ok(self.ctx.set_user_memory(bytes)?);
        }
        if self.ctx.try_set_user_memory(bytes) {
            return Ok(());
        }
        self.spill_index()
    }

    /// Sorts the buffered rows and writes them out as one sorted run.
    fn spill_index(&mut self) -> Result<(), OperatorError> {
        let Some(spill) = self.spill.as_mut() else {
            return Err(OperatorError::illegal_state("spill is not enabled"));
        };
        spill.check_pending()?;
        if self.index.is_empty() {
            return Ok(());
        }
        self.index.sort(&self.comparator)?;
        let pages = self.index.to_pages(self.spec.max_page_positions)?;
        let rows = self.index.position_count();
        self.index.clear();
        self.ctx.set_user_memory(self.index.estimated_size_in_bytes())?;

        let memory = self
            .ctx
            .memory()
            .new_local(format!("spill-{}", spill.spillers.len()));
        let mut spiller = spill.factory.create(memory)?;
        spill.pending = Some(spiller.spill(pages));
        spill.spillers.push(spiller);
        info!(
            target: "snapflow::window",
            operator = %self.ctx.unique_id(),
            rows,
            runs = spill.spillers.len(),
            "Spilled window input"
        );
        Ok(())
    }

    /// Sorts what is buffered, or sets up a merge over the spilled runs plus
    /// the in-memory remainder.
    fn start_output(&mut self) -> Result<(), OperatorError> {
        let Some(spill) = self.spill.as_mut().filter(|spill| !spill.spillers.is_empty()) else {
            self.index.sort(&self.comparator)?;
            return Ok(());
        };
        spill.check_pending()?;

        self.index.sort(&self.comparator)?;
        let remainder = self.index.to_pages(self.spec.max_page_positions)?;
        self.index.clear();

        let mut runs: Vec<SortedRun> = Vec::with_capacity(spill.spillers.len() + 1);
        for spiller in spill.spillers.iter_mut() {
            let pages = spiller.get_spilled_pages()?;
            runs.push(Box::new(pages.map(|page| page.map_err(OperatorError::from))));
        }
        runs.push(Box::new(remainder.into_iter().map(Ok)));
        debug!(target: "snapflow::window", operator = %self.ctx.unique_id(), runs = runs.len(), "Merging spilled runs");

        self.spilled = Some(SpilledPartitions {
            merged: MergeSortedPages::new(
                runs,
                self.spec.types.clone(),
                self.comparator.clone(),
                self.spec.max_page_positions,
            ),
            carry: None,
        });
        Ok(())
    }

    /// Opens the next partition, loading it from the merged runs when spilled.
    fn advance_partition(&mut self) -> Result<bool, OperatorError> {
        let mut start = self.partition.map_or(0, |p| p.partition_end());
        if start >= self.index.position_count() {
            let Some(spilled) = self.spilled.as_mut() else {
                return Ok(false);
            };
            let Some(index) = spilled.next_partition(&self.spec.types, &self.spec.partition_channels)?
            else {
                return Ok(false);
            };
            self.index = index;
            self.ctx.set_user_memory(self.index.estimated_size_in_bytes())?;
            start = 0;
        }
        let end = self.index.find_group_end(
            &self.spec.partition_channels,
            start,
            self.index.position_count(),
        )?;
        self.partition = Some(WindowPartition::new(
            &self.index,
            start,
            end,
            &self.spec.sort_channels,
            &mut self.functions,
        )?);
        Ok(true)
    }

    fn produce(&mut self) -> Result<Option<Page>, OperatorError> {
        while !self.builder.is_full() {
            if self.ctx.is_cancelled() {
                return Err(OperatorError::Cancelled);
            }
            let has_row = self.partition.is_some_and(|p| p.has_next());
            if !has_row && !self.advance_partition()? {
                self.state = State::Finished;
                break;
            }
            let Some(partition) = self.partition.as_mut() else {
                break;
            };
            partition.process_next_row(
                &self.index,
                &self.spec.output_channels,
                &self.spec.sort_channels,
                &mut self.functions,
                &mut self.builder,
            )?;
        }

        if self.state == State::Finished {
            self.index.clear();
            self.spilled = None;
            self.ctx.set_user_memory(0)?;
        }
        if self.builder.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.builder.build()?))
    }
}

impl Operator for WindowOperator {
    fn operator_context(&self) -> &OperatorContext {
        &self.ctx
    }

    fn needs_input(&self) -> bool {
        self.state == State::NeedsInput && !self.is_spilling()
    }

    fn add_input(&mut self, page: Page) -> Result<(), OperatorError> {
        if self.state != State::NeedsInput {
            return Err(OperatorError::illegal_state("window operator is not accepting input"));
        }
        if self.process_snapshot_page(&page)? {
            return Ok(());
        }
        self.ctx.record_input(page.size_in_bytes(), page.position_count());
        self.index.add_page(&page)?;
        self.update_memory()
    }

    fn get_output(&mut self) -> Result<Option<Page>, OperatorError> {
        if let Some(marker) = self.snapshot.next_marker() {
            return Ok(Some(marker));
        }
        if self.state != State::HasOutput || self.is_spilling() {
            return Ok(None);
        }
        if self.partition.is_none() && self.spilled.is_none() {
            self.start_output()?;
        }
        let page = self.produce()?;
        if let Some(page) = &page {
            self.ctx.record_output(page.size_in_bytes(), page.position_count());
        }
        Ok(page)
    }

    fn is_blocked(&self) -> Blocked {
        match self.spill.as_ref().and_then(|spill| spill.pending.as_ref()) {
            Some(pending) => pending.blocked(),
            None => NOT_BLOCKED,
        }
    }

    fn finish(&mut self) -> Result<(), OperatorError> {
        if self.state == State::NeedsInput {
            self.state = State::HasOutput;
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.state == State::Finished && !self.snapshot.has_pending_marker()
    }

    fn close(&mut self) -> Result<(), OperatorError> {
        if let Some(spill) = self.spill.as_mut() {
            for spiller in spill.spillers.iter_mut() {
                spiller.close();
            }
            spill.spillers.clear();
            spill.pending = None;
        }
        self.spilled = None;
        self.index.clear();
        self.ctx.release_memory();
        Ok(())
    }
}

impl Restorable for WindowOperator {
    fn capture(&self, serde: &PagesSerde) -> Result<OperatorState, SnapshotError> {
        if self.spill.is_some() {
            return Err(SnapshotError::NotRestorable(self.ctx.unique_id().to_string()));
        }
        let pages = self.index.to_pages(self.spec.max_page_positions)?;
        Ok(OperatorState::Window(WindowState {
            memory: self.ctx.memory_state(),
            pages: serialize_pages(serde, &pages)?,
            finishing: self.state != State::NeedsInput,
        }))
    }

    fn restore(&mut self, state: OperatorState, serde: &PagesSerde) -> Result<(), SnapshotError> {
        let OperatorState::Window(state) = state else {
            return Err(OperatorState::mismatch(self.ctx.unique_id(), "Window"));
        };
        self.index.clear();
        for page in deserialize_pages(serde, &state.pages)? {
            self.index.add_page(&page)?;
        }
        self.partition = None;
        self.builder.reset();
        self.state = if state.finishing {
            State::HasOutput
        } else {
            State::NeedsInput
        };
        self.ctx.restore_memory(state.memory)?;
        Ok(())
    }
}

impl SingleInputRestorable for WindowOperator {
    fn snapshot_state(&mut self) -> &mut SingleInputSnapshotState {
        &mut self.snapshot
    }
}

pub struct WindowOperatorFactory {
    operator_id: usize,
    plan_node_id: String,
    spec: WindowSpec,
    spiller_factory: Option<Arc<SpillerFactory>>,
    closed: bool,
}

impl WindowOperatorFactory {
    pub fn new(operator_id: usize, plan_node_id: impl Into<String>, spec: WindowSpec) -> Self {
        Self {
            operator_id,
            plan_node_id: plan_node_id.into(),
            spec,
            spiller_factory: None,
            closed: false,
        }
    }

    /// Lets operators spill sorted runs when their memory reservation fails.
    /// Such operators cannot take part in snapshots.
    pub fn with_spill(mut self, factory: Arc<SpillerFactory>) -> Self {
        self.spiller_factory = Some(factory);
        self
    }
}

impl OperatorFactory for WindowOperatorFactory {
    fn operator_type(&self) -> &'static str {
        "WindowOperator"
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
        Ok(Box::new(WindowOperator::new(
            ctx,
            spec,
            self.spiller_factory.clone(),
        )?))
    }

    fn no_more_operators(&mut self) {
        self.closed = true;
    }

    fn is_restorable(&self) -> bool {
        self.spiller_factory.is_none()
    }
}
