use super::Page;
use crate::engine::core::block::BlockBuilder;
use crate::engine::errors::PageError;
use crate::engine::types::Type;

pub const DEFAULT_MAX_PAGE_POSITIONS: usize = 1024;
pub const DEFAULT_MAX_PAGE_BYTES: u64 = 1024 * 1024;

/// Accumulates rows into one builder per channel and cuts pages once a row or
/// byte threshold is hit.
#[derive(Debug)]
pub struct PageBuilder {
    types: Vec<Type>,
    builders: Vec<BlockBuilder>,
    declared_positions: usize,
    max_positions: usize,
    max_bytes: u64,
}

impl PageBuilder {
    pub fn new(types: Vec<Type>) -> Self {
        Self::with_limits(types, DEFAULT_MAX_PAGE_POSITIONS, DEFAULT_MAX_PAGE_BYTES)
    }

    pub fn with_limits(types: Vec<Type>, max_positions: usize, max_bytes: u64) -> Self {
        let max_positions = max_positions.max(1);
        let builders = types
            .iter()
            .map(|t| t.create_block_builder(max_positions))
            .collect();
        Self {
            types,
            builders,
            declared_positions: 0,
            max_positions,
            max_bytes,
        }
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn builder(&mut self, channel: usize) -> Result<&mut BlockBuilder, PageError> {
        self.builders
            .get_mut(channel)
            .ok_or(PageError::ChannelOutOfBounds(channel))
    }

    pub fn declare_position(&mut self) {
        self.declared_positions += 1;
    }

    pub fn declare_positions(&mut self, count: usize) {
        self.declared_positions += count;
    }

    pub fn position_count(&self) -> usize {
        self.declared_positions
    }

    pub fn is_empty(&self) -> bool {
        self.declared_positions == 0
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.builders.iter().map(BlockBuilder::size_in_bytes).sum()
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        self.builders
            .iter()
            .map(BlockBuilder::retained_size_in_bytes)
            .sum()
    }

    pub fn is_full(&self) -> bool {
        self.declared_positions >= self.max_positions || self.size_in_bytes() >= self.max_bytes
    }

    /// Builds the accumulated page and resets every builder for the next one.
    pub fn build(&mut self) -> Result<Page, PageError> {
        let position_count = self.declared_positions;
        let mut blocks = Vec::with_capacity(self.builders.len());
        for (channel, builder) in self.builders.iter_mut().enumerate() {
            if builder.position_count() != position_count {
                return Err(PageError::InconsistentPositionCount {
                    channel,
                    expected: position_count,
                    got: builder.position_count(),
                });
            }
            let fresh = builder.new_block_builder_like();
            blocks.push(std::mem::replace(builder, fresh).build()?);
        }
        self.declared_positions = 0;
        Page::with_position_count(position_count, blocks)
    }

    pub fn reset(&mut self) {
        for builder in self.builders.iter_mut() {
            *builder = builder.new_block_builder_like();
        }
        self.declared_positions = 0;
    }
}
