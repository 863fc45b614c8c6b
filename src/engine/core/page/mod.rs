pub mod comparator;
pub mod marker;
pub mod merge;
pub mod page_builder;
pub mod pages_index;

#[cfg(test)]
mod merge_test;
#[cfg(test)]
mod page_test;
#[cfg(test)]
mod pages_index_test;

pub use comparator::RowComparator;
pub use marker::{MARKER_PAGE_BYTES, MarkerPage};
pub use merge::MergeSortedPages;
pub use page_builder::PageBuilder;
pub use pages_index::PagesIndex;

use crate::engine::core::block::Block;
use crate::engine::errors::{BlockError, PageError};

/// A columnar batch: one block per channel, all with the same position count.
///
/// Marker pages are degenerate pages with a single position and no blocks.
#[derive(Debug, Clone)]
pub struct Page {
    position_count: usize,
    blocks: Vec<Block>,
    marker: Option<MarkerPage>,
}

impl Page {
    pub fn new(blocks: Vec<Block>) -> Result<Self, PageError> {
        let position_count = blocks
            .first()
            .map(Block::position_count)
            .ok_or(PageError::EmptyPage)?;
        Self::with_position_count(position_count, blocks)
    }

    /// Builds a page with an explicit position count, which also allows pages
    /// without channels.
    pub fn with_position_count(position_count: usize, blocks: Vec<Block>) -> Result<Self, PageError> {
        for (channel, block) in blocks.iter().enumerate() {
            if block.position_count() != position_count {
                return Err(PageError::InconsistentPositionCount {
                    channel,
                    expected: position_count,
                    got: block.position_count(),
                });
            }
        }
        Ok(Self {
            position_count,
            blocks,
            marker: None,
        })
    }

    pub fn marker(marker: MarkerPage) -> Self {
        Self {
            position_count: 1,
            blocks: Vec::new(),
            marker: Some(marker),
        }
    }

    pub fn is_marker(&self) -> bool {
        self.marker.is_some()
    }

    pub fn as_marker(&self) -> Option<&MarkerPage> {
        self.marker.as_ref()
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn channel_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn block(&self, channel: usize) -> Result<&Block, PageError> {
        self.blocks
            .get(channel)
            .ok_or(PageError::ChannelOutOfBounds(channel))
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.blocks.iter().map(Block::size_in_bytes).sum()
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        self.blocks.iter().map(Block::retained_size_in_bytes).sum()
    }

    fn data_only(&self) -> Result<(), PageError> {
        if self.is_marker() {
            return Err(PageError::MarkerPage);
        }
        Ok(())
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Page, PageError> {
        self.data_only()?;
        let blocks = self
            .blocks
            .iter()
            .map(|b| b.get_region(offset, length))
            .collect::<Result<Vec<_>, _>>()?;
        if blocks.is_empty() && offset + length > self.position_count {
            return Err(PageError::Block(BlockError::InvalidRegion {
                offset,
                length,
                count: self.position_count,
            }));
        }
        Page::with_position_count(length, blocks)
    }

    pub fn copy_positions(&self, positions: &[usize]) -> Result<Page, PageError> {
        self.data_only()?;
        if let Some(&position) = positions.iter().find(|p| **p >= self.position_count) {
            return Err(PageError::Block(BlockError::PositionOutOfBounds {
                position,
                count: self.position_count,
            }));
        }
        let blocks = self
            .blocks
            .iter()
            .map(|b| b.copy_positions(positions))
            .collect::<Result<Vec<_>, _>>()?;
        Page::with_position_count(positions.len(), blocks)
    }

    /// Page holding only the given channels, in the given order.
    pub fn get_columns(&self, channels: &[usize]) -> Result<Page, PageError> {
        self.data_only()?;
        let blocks = channels
            .iter()
            .map(|c| self.block(*c).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Page::with_position_count(self.position_count, blocks)
    }

    pub fn append_column(&self, block: Block) -> Result<Page, PageError> {
        self.data_only()?;
        let mut blocks = self.blocks.clone();
        blocks.push(block);
        Page::with_position_count(self.position_count, blocks)
    }
}
