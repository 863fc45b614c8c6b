use std::cmp::Ordering;

use super::Page;
use crate::engine::core::block::Block;
use crate::engine::errors::{BlockError, PageError};
use crate::engine::types::{SortOrder, Type};

/// Multi-column row ordering over the sort channels of a page.
#[derive(Debug, Clone)]
pub struct RowComparator {
    sort_types: Vec<Type>,
    sort_channels: Vec<usize>,
    sort_orders: Vec<SortOrder>,
}

impl RowComparator {
    pub fn new(
        sort_types: Vec<Type>,
        sort_channels: Vec<usize>,
        sort_orders: Vec<SortOrder>,
    ) -> Result<Self, BlockError> {
        if sort_types.len() != sort_channels.len() || sort_channels.len() != sort_orders.len() {
            return Err(BlockError::TypeMismatch(format!(
                "sort key has {} types, {} channels and {} orders",
                sort_types.len(),
                sort_channels.len(),
                sort_orders.len()
            )));
        }
        Ok(Self {
            sort_types,
            sort_channels,
            sort_orders,
        })
    }

    /// Builds a comparator from the full column types of the page and the
    /// channels to sort on.
    pub fn for_channels(
        types: &[Type],
        sort_channels: Vec<usize>,
        sort_orders: Vec<SortOrder>,
    ) -> Result<Self, BlockError> {
        let sort_types = sort_channels
            .iter()
            .map(|c| {
                types.get(*c).copied().ok_or(BlockError::PositionOutOfBounds {
                    position: *c,
                    count: types.len(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(sort_types, sort_channels, sort_orders)
    }

    pub fn sort_channels(&self) -> &[usize] {
        &self.sort_channels
    }

    pub fn compare_blocks(
        &self,
        left: &[Block],
        left_position: usize,
        right: &[Block],
        right_position: usize,
    ) -> Result<Ordering, PageError> {
        for ((ty, channel), order) in self
            .sort_types
            .iter()
            .zip(&self.sort_channels)
            .zip(&self.sort_orders)
        {
            let l = left.get(*channel).ok_or(PageError::ChannelOutOfBounds(*channel))?;
            let r = right.get(*channel).ok_or(PageError::ChannelOutOfBounds(*channel))?;
            let ordering = order.compare(*ty, l, left_position, r, right_position)?;
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    }

    pub fn compare(
        &self,
        left: &Page,
        left_position: usize,
        right: &Page,
        right_position: usize,
    ) -> Result<Ordering, PageError> {
        self.compare_blocks(left.blocks(), left_position, right.blocks(), right_position)
    }
}
