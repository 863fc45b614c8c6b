use super::builder::{GroupedTopNBuilder, TopNResult};
use super::group_by_hash::GroupByHash;
use crate::engine::core::page::{Page, RowComparator};
use crate::engine::errors::{OperatorError, PageError};
use crate::engine::types::{SortOrder, Type};

/// Construction arguments of a top-N, kept so state can be rebuilt on restore.
#[derive(Debug, Clone)]
pub struct TopNSpec {
    pub types: Vec<Type>,
    pub top_n: usize,
    pub sort_channels: Vec<usize>,
    pub sort_orders: Vec<SortOrder>,
    pub partition_channels: Vec<usize>,
    pub produce_row_number: bool,
    pub max_page_positions: usize,
}

impl TopNSpec {
    pub fn new(
        types: Vec<Type>,
        top_n: usize,
        sort_channels: Vec<usize>,
        sort_orders: Vec<SortOrder>,
    ) -> Self {
        Self {
            types,
            top_n,
            sort_channels,
            sort_orders,
            partition_channels: Vec::new(),
            produce_row_number: false,
            max_page_positions: 1024,
        }
    }

    pub fn partitioned_by(mut self, channels: Vec<usize>) -> Self {
        self.partition_channels = channels;
        self
    }

    pub fn with_row_number(mut self) -> Self {
        self.produce_row_number = true;
        self
    }

    pub fn with_max_page_positions(mut self, max_page_positions: usize) -> Self {
        self.max_page_positions = max_page_positions;
        self
    }

    fn create_builder(&self) -> Result<GroupedTopNBuilder, PageError> {
        let comparator = RowComparator::for_channels(
            &self.types,
            self.sort_channels.clone(),
            self.sort_orders.clone(),
        )?;
        Ok(GroupedTopNBuilder::new(
            self.types.clone(),
            comparator,
            self.top_n,
            self.produce_row_number,
            GroupByHash::new(self.types.clone(), self.partition_channels.clone()),
        ))
    }
}

/// Drives a `GroupedTopNBuilder`: buffers input, reports memory through the
/// supplied callback and hands out the sorted result once input is finished.
#[derive(Debug)]
pub struct TopNProcessor {
    spec: TopNSpec,
    builder: Option<GroupedTopNBuilder>,
    output: Option<TopNResult>,
    finishing: bool,
}

impl TopNProcessor {
    pub fn new(spec: TopNSpec) -> Result<Self, PageError> {
        let builder = if spec.top_n == 0 {
            None
        } else {
            Some(spec.create_builder()?)
        };
        Ok(Self {
            spec,
            builder,
            output: None,
            finishing: false,
        })
    }

    pub fn spec(&self) -> &TopNSpec {
        &self.spec
    }

    pub fn estimated_size_in_bytes(&self) -> u64 {
        self.builder
            .as_ref()
            .map(GroupedTopNBuilder::estimated_size_in_bytes)
            .unwrap_or(0)
    }

    pub fn add_input<F>(&mut self, page: &Page, mut report_memory: F) -> Result<(), OperatorError>
    where
        F: FnMut(u64) -> Result<(), OperatorError>,
    {
        if self.finishing {
            return Err(OperatorError::illegal_state("top-n input after finish"));
        }
        if let Some(builder) = self.builder.as_mut() {
            builder.add_page(page)?;
            report_memory(builder.estimated_size_in_bytes())?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), OperatorError> {
        if self.finishing {
            return Ok(());
        }
        self.finishing = true;
        if let Some(mut builder) = self.builder.take() {
            self.output = Some(builder.build_result(self.spec.max_page_positions)?);
        }
        Ok(())
    }

    pub fn is_finishing(&self) -> bool {
        self.finishing
    }

    /// Nothing until `finish`; then one page per call until exhausted.
    pub fn get_output(&mut self) -> Result<Option<Page>, OperatorError> {
        let Some(output) = self.output.as_mut() else {
            return Ok(None);
        };
        match output.next() {
            Some(page) => Ok(Some(page?)),
            None => {
                self.output = None;
                Ok(None)
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.spec.top_n == 0 || (self.finishing && self.output.is_none())
    }

    pub fn retained_pages(&self) -> Result<Vec<Page>, PageError> {
        match &self.builder {
            Some(builder) => builder.retained_pages(self.spec.max_page_positions),
            None => Ok(Vec::new()),
        }
    }

    /// Rebuilds the builder from the construction arguments and reloads the
    /// given rows. Safe to call repeatedly.
    pub fn restore(&mut self, rows: &[Page], finishing: bool) -> Result<(), OperatorError> {
        self.output = None;
        self.finishing = false;
        self.builder = if self.spec.top_n == 0 {
            None
        } else {
            Some(self.spec.create_builder()?)
        };
        if let Some(builder) = self.builder.as_mut() {
            for page in rows {
                builder.add_page(page)?;
            }
        }
        if finishing {
            self.finish()?;
        }
        Ok(())
    }
}
