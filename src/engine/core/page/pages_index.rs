use std::cmp::Ordering;

use super::{Page, PageBuilder, RowComparator};
use crate::engine::core::block::{Block, BlockBuilder};
use crate::engine::errors::{BlockError, PageError};
use crate::engine::types::{ScalarValue, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowAddress {
    page: u32,
    position: u32,
}

/// Accumulated input pages plus a row address list that can be sorted without
/// moving any column data.
#[derive(Debug)]
pub struct PagesIndex {
    types: Vec<Type>,
    pages: Vec<Page>,
    addresses: Vec<RowAddress>,
    estimated_size: u64,
}

impl PagesIndex {
    pub fn new(types: Vec<Type>, expected_positions: usize) -> Self {
        Self {
            types,
            pages: Vec::new(),
            addresses: Vec::with_capacity(expected_positions),
            estimated_size: 0,
        }
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn position_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn estimated_size_in_bytes(&self) -> u64 {
        self.estimated_size + 8 * self.addresses.capacity() as u64
    }

    pub fn add_page(&mut self, page: &Page) -> Result<(), PageError> {
        if page.is_marker() {
            return Err(PageError::MarkerPage);
        }
        if page.position_count() == 0 {
            return Ok(());
        }
        if page.channel_count() != self.types.len() {
            return Err(PageError::ChannelOutOfBounds(page.channel_count()));
        }
        let page_index = self.pages.len() as u32;
        for position in 0..page.position_count() {
            self.addresses.push(RowAddress {
                page: page_index,
                position: position as u32,
            });
        }
        self.estimated_size += page.retained_size_in_bytes();
        self.pages.push(page.clone());
        Ok(())
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.addresses.clear();
        self.addresses.shrink_to_fit();
        self.estimated_size = 0;
    }

    fn address(&self, index: usize) -> Result<RowAddress, PageError> {
        self.addresses
            .get(index)
            .copied()
            .ok_or(PageError::Block(BlockError::PositionOutOfBounds {
                position: index,
                count: self.addresses.len(),
            }))
    }

    /// Blocks and position backing the row at `index`.
    pub fn row(&self, index: usize) -> Result<(&[Block], usize), PageError> {
        let address = self.address(index)?;
        let page = &self.pages[address.page as usize];
        Ok((page.blocks(), address.position as usize))
    }

    pub fn is_null(&self, channel: usize, index: usize) -> Result<bool, PageError> {
        let (blocks, position) = self.row(index)?;
        let block = blocks
            .get(channel)
            .ok_or(PageError::ChannelOutOfBounds(channel))?;
        Ok(block.is_null(position)?)
    }

    pub fn get_long(&self, channel: usize, index: usize) -> Result<i64, PageError> {
        let (blocks, position) = self.row(index)?;
        let block = blocks
            .get(channel)
            .ok_or(PageError::ChannelOutOfBounds(channel))?;
        Ok(block.get_long(position, 0)?)
    }

    pub fn get_value(&self, channel: usize, index: usize) -> Result<ScalarValue, PageError> {
        let (blocks, position) = self.row(index)?;
        let block = blocks
            .get(channel)
            .ok_or(PageError::ChannelOutOfBounds(channel))?;
        Ok(self.types[channel].get_value(block, position)?)
    }

    pub fn append_to(
        &self,
        channel: usize,
        index: usize,
        builder: &mut BlockBuilder,
    ) -> Result<(), PageError> {
        let (blocks, position) = self.row(index)?;
        let block = blocks
            .get(channel)
            .ok_or(PageError::ChannelOutOfBounds(channel))?;
        Ok(block.write_position_to(position, builder)?)
    }

    pub fn compare(
        &self,
        comparator: &RowComparator,
        left: usize,
        right: usize,
    ) -> Result<Ordering, PageError> {
        let (left_blocks, left_position) = self.row(left)?;
        let (right_blocks, right_position) = self.row(right)?;
        comparator.compare_blocks(left_blocks, left_position, right_blocks, right_position)
    }

    /// True when both rows hold equal (or both null) values on every channel.
    pub fn position_equals(
        &self,
        channels: &[usize],
        left: usize,
        right: usize,
    ) -> Result<bool, PageError> {
        let (left_blocks, left_position) = self.row(left)?;
        let (right_blocks, right_position) = self.row(right)?;
        for &channel in channels {
            let ty = self
                .types
                .get(channel)
                .ok_or(PageError::ChannelOutOfBounds(channel))?;
            if !ty.equal(
                &left_blocks[channel],
                left_position,
                &right_blocks[channel],
                right_position,
            )? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// First index in `(start, end]` whose key differs from the row at `start`.
    pub fn find_group_end(
        &self,
        channels: &[usize],
        start: usize,
        end: usize,
    ) -> Result<usize, PageError> {
        let mut index = start + 1;
        while index < end && self.position_equals(channels, start, index)? {
            index += 1;
        }
        Ok(index.min(end))
    }

    pub fn sort(&mut self, comparator: &RowComparator) -> Result<(), PageError> {
        let end = self.addresses.len();
        self.sort_range(comparator, 0, end)
    }

    pub fn sort_range(
        &mut self,
        comparator: &RowComparator,
        start: usize,
        end: usize,
    ) -> Result<(), PageError> {
        let mut failure = None;
        let pages = &self.pages;
        self.addresses[start..end].sort_by(|a, b| {
            let left = &pages[a.page as usize];
            let right = &pages[b.page as usize];
            match comparator.compare(left, a.position as usize, right, b.position as usize) {
                Ok(ordering) => ordering,
                Err(err) => {
                    failure.get_or_insert(err);
                    Ordering::Equal
                }
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Materializes rows `[start, end)` in address order into pages of at most
    /// `max_positions` rows.
    pub fn build_pages(
        &self,
        start: usize,
        end: usize,
        max_positions: usize,
    ) -> Result<Vec<Page>, PageError> {
        let mut builder = PageBuilder::with_limits(self.types.clone(), max_positions, u64::MAX);
        let mut pages = Vec::new();
        for index in start..end {
            for channel in 0..self.types.len() {
                self.append_to(channel, index, builder.builder(channel)?)?;
            }
            builder.declare_position();
            if builder.is_full() {
                pages.push(builder.build()?);
            }
        }
        if !builder.is_empty() {
            pages.push(builder.build()?);
        }
        Ok(pages)
    }

    pub fn to_pages(&self, max_positions: usize) -> Result<Vec<Page>, PageError> {
        self.build_pages(0, self.addresses.len(), max_positions)
    }
}
