use std::sync::Arc;

use super::block_util::{
    check_readable_position, check_valid_positions, check_valid_region, compact_nulls,
    gather_nulls, nulls_retained_size,
};
use super::{Block, BlockBuilder};
use crate::engine::errors::BlockError;

pub const INT128_BYTES: u64 = 16;

/// Two 64-bit words per position: word 0 holds the low half, word 8 the high half.
#[derive(Debug, Clone)]
pub struct Int128ArrayBlock {
    position_offset: usize,
    position_count: usize,
    value_is_null: Option<Arc<[bool]>>,
    values: Arc<[i64]>,
}

impl Int128ArrayBlock {
    pub fn new(
        position_count: usize,
        value_is_null: Option<Vec<bool>>,
        values: Vec<i64>,
    ) -> Result<Self, BlockError> {
        Self::from_parts(0, position_count, value_is_null.map(Arc::from), Arc::from(values))
    }

    pub(crate) fn from_parts(
        position_offset: usize,
        position_count: usize,
        value_is_null: Option<Arc<[bool]>>,
        values: Arc<[i64]>,
    ) -> Result<Self, BlockError> {
        if values.len() < (position_offset + position_count) * 2 {
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
        (INT128_BYTES + 1) * self.position_count as u64
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + nulls_retained_size(self.value_is_null.as_deref())
            + 8 * self.values.len() as u64
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

    pub fn get_long(&self, position: usize, offset: usize) -> Result<i64, BlockError> {
        check_readable_position(position, self.position_count)?;
        let base = (position + self.position_offset) * 2;
        match offset {
            0 => Ok(self.values[base]),
            8 => Ok(self.values[base + 1]),
            other => Err(BlockError::InvalidWordOffset(other)),
        }
    }

    pub fn get_int128(&self, position: usize) -> Result<i128, BlockError> {
        let low = self.get_long(position, 0)? as u64;
        let high = self.get_long(position, 8)?;
        Ok(((high as i128) << 64) | low as i128)
    }

    pub fn write_position_to(
        &self,
        position: usize,
        builder: &mut BlockBuilder,
    ) -> Result<(), BlockError> {
        if self.is_null(position)? {
            return builder.append_null();
        }
        let base = (position + self.position_offset) * 2;
        builder.write_long(self.values[base])?;
        builder.write_long(self.values[base + 1])?;
        builder.close_entry()
    }

    pub fn get_single_value_block(&self, position: usize) -> Result<Block, BlockError> {
        let is_null = self.is_null(position)?;
        let base = (position + self.position_offset) * 2;
        let block = Int128ArrayBlock::new(
            1,
            is_null.then(|| vec![true]),
            vec![self.values[base], self.values[base + 1]],
        )?;
        Ok(Block::Int128Array(block))
    }

    pub fn copy_positions(&self, positions: &[usize]) -> Result<Block, BlockError> {
        check_valid_positions(positions, self.position_count)?;
        let mut values = Vec::with_capacity(positions.len() * 2);
        for position in positions {
            let base = (position + self.position_offset) * 2;
            values.push(self.values[base]);
            values.push(self.values[base + 1]);
        }
        let nulls = gather_nulls(self.value_is_null.as_deref(), self.position_offset, positions);
        Ok(Block::Int128Array(Int128ArrayBlock::new(
            positions.len(),
            nulls,
            values,
        )?))
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        check_valid_region(self.position_count, offset, length)?;
        Ok(Block::Int128Array(Int128ArrayBlock::from_parts(
            self.position_offset + offset,
            length,
            self.value_is_null.clone(),
            Arc::clone(&self.values),
        )?))
    }

    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        check_valid_region(self.position_count, offset, length)?;
        let start = self.position_offset + offset;
        let values = self.values[start * 2..(start + length) * 2].to_vec();
        let nulls = compact_nulls(self.value_is_null.as_deref(), start, length);
        Ok(Block::Int128Array(Int128ArrayBlock::new(length, nulls, values)?))
    }
}
