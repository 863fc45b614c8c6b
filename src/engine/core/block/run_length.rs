use std::sync::Arc;

use super::block_util::{check_readable_position, check_valid_positions, check_valid_region};
use super::{Block, BlockBuilder};
use crate::engine::errors::BlockError;

/// A single-position block repeated `position_count` times.
#[derive(Debug, Clone)]
pub struct RunLengthEncodedBlock {
    value: Arc<Block>,
    position_count: usize,
}

impl RunLengthEncodedBlock {
    pub fn new(value: Block, position_count: usize) -> Result<Self, BlockError> {
        if value.position_count() != 1 {
            return Err(BlockError::InsufficientStorage(format!(
                "RLE value block must have exactly one position, has {}",
                value.position_count()
            )));
        }
        Ok(Self {
            value: Arc::new(value),
            position_count,
        })
    }

    fn with_count(&self, position_count: usize) -> Block {
        Block::RunLengthEncoded(RunLengthEncodedBlock {
            value: Arc::clone(&self.value),
            position_count,
        })
    }

    pub fn value(&self) -> &Block {
        &self.value
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.value.size_in_bytes()
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64 + self.value.retained_size_in_bytes()
    }

    pub fn may_have_null(&self) -> bool {
        self.position_count > 0 && self.value.may_have_null()
    }

    /// Maps any valid position onto the single stored value.
    pub fn value_position(&self, position: usize) -> Result<usize, BlockError> {
        check_readable_position(position, self.position_count)?;
        Ok(0)
    }

    pub fn is_null(&self, position: usize) -> Result<bool, BlockError> {
        self.value.is_null(self.value_position(position)?)
    }

    pub fn write_position_to(
        &self,
        position: usize,
        builder: &mut BlockBuilder,
    ) -> Result<(), BlockError> {
        self.value
            .write_position_to(self.value_position(position)?, builder)
    }

    pub fn get_single_value_block(&self, position: usize) -> Result<Block, BlockError> {
        self.value_position(position)?;
        Ok((*self.value).clone())
    }

    pub fn copy_positions(&self, positions: &[usize]) -> Result<Block, BlockError> {
        check_valid_positions(positions, self.position_count)?;
        Ok(self.with_count(positions.len()))
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        check_valid_region(self.position_count, offset, length)?;
        Ok(self.with_count(length))
    }

    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        self.get_region(offset, length)
    }
}
