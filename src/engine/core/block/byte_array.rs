use std::sync::Arc;

use super::block_util::{
    check_readable_position, check_valid_positions, check_valid_region, compact_nulls,
    gather_nulls, nulls_retained_size,
};
use super::{Block, BlockBuilder};
use crate::engine::errors::BlockError;

/// One byte per position. Backs BOOLEAN columns.
#[derive(Debug, Clone)]
pub struct ByteArrayBlock {
    position_offset: usize,
    position_count: usize,
    value_is_null: Option<Arc<[bool]>>,
    values: Arc<[u8]>,
}

impl ByteArrayBlock {
    pub fn new(
        position_count: usize,
        value_is_null: Option<Vec<bool>>,
        values: Vec<u8>,
    ) -> Result<Self, BlockError> {
        Self::from_parts(0, position_count, value_is_null.map(Arc::from), Arc::from(values))
    }

    pub(crate) fn from_parts(
        position_offset: usize,
        position_count: usize,
        value_is_null: Option<Arc<[bool]>>,
        values: Arc<[u8]>,
    ) -> Result<Self, BlockError> {
        if values.len() < position_offset + position_count {
            return Err(BlockError::InsufficientStorage(
                "values length is less than positionCount".into(),
            ));
        }
        if let Some(nulls) = &value_is_null {
            if nulls.len() < position_offset + position_count {
                return Err(BlockError::InsufficientStorage(
                    "isNull length is less than positionCount".into(),
                ));
            }
        }
        Ok(Self {
            position_offset,
            position_count,
            value_is_null,
            values,
        })
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn size_in_bytes(&self) -> u64 {
        2 * self.position_count as u64
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + nulls_retained_size(self.value_is_null.as_deref())
            + self.values.len() as u64
    }

    pub fn may_have_null(&self) -> bool {
        self.value_is_null.is_some()
    }

    pub fn is_null(&self, position: usize) -> Result<bool, BlockError> {
        check_readable_position(position, self.position_count)?;
        Ok(self
            .value_is_null
            .as_ref()
            .is_some_and(|nulls| nulls[position + self.position_offset]))
    }

    pub fn get_byte(&self, position: usize) -> Result<u8, BlockError> {
        check_readable_position(position, self.position_count)?;
        Ok(self.values[position + self.position_offset])
    }

    pub fn write_position_to(
        &self,
        position: usize,
        builder: &mut BlockBuilder,
    ) -> Result<(), BlockError> {
        if self.is_null(position)? {
            return builder.append_null();
        }
        builder.write_byte(self.values[position + self.position_offset])?;
        builder.close_entry()
    }

    pub fn get_single_value_block(&self, position: usize) -> Result<Block, BlockError> {
        let is_null = self.is_null(position)?;
        Ok(Block::ByteArray(ByteArrayBlock::new(
            1,
            is_null.then(|| vec![true]),
            vec![self.values[position + self.position_offset]],
        )?))
    }

    pub fn copy_positions(&self, positions: &[usize]) -> Result<Block, BlockError> {
        check_valid_positions(positions, self.position_count)?;
        let values = positions
            .iter()
            .map(|p| self.values[p + self.position_offset])
            .collect();
        let nulls = gather_nulls(self.value_is_null.as_deref(), self.position_offset, positions);
        Ok(Block::ByteArray(ByteArrayBlock::new(
            positions.len(),
            nulls,
            values,
        )?))
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        check_valid_region(self.position_count, offset, length)?;
        Ok(Block::ByteArray(ByteArrayBlock::from_parts(
            self.position_offset + offset,
            length,
            self.value_is_null.clone(),
            Arc::clone(&self.values),
        )?))
    }

    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        check_valid_region(self.position_count, offset, length)?;
        let start = self.position_offset + offset;
        let values = self.values[start..start + length].to_vec();
        let nulls = compact_nulls(self.value_is_null.as_deref(), start, length);
        Ok(Block::ByteArray(ByteArrayBlock::new(length, nulls, values)?))
    }
}
