use std::sync::Arc;

use bytes::Bytes;

use super::block_util::{
    check_readable_position, check_valid_positions, check_valid_region, compact_nulls,
    gather_nulls, nulls_retained_size,
};
use super::{Block, BlockBuilder};
use crate::engine::errors::BlockError;

/// Variable-length values laid end to end in one shared slice.
/// `offsets` has one more entry than the positions it covers.
#[derive(Debug, Clone)]
pub struct VariableWidthBlock {
    array_offset: usize,
    position_count: usize,
    slice: Bytes,
    offsets: Arc<[u32]>,
    value_is_null: Option<Arc<[bool]>>,
}

impl VariableWidthBlock {
    pub fn new(
        position_count: usize,
        slice: Bytes,
        offsets: Vec<u32>,
        value_is_null: Option<Vec<bool>>,
    ) -> Result<Self, BlockError> {
        Self::from_parts(
            0,
            position_count,
            slice,
            Arc::from(offsets),
            value_is_null.map(Arc::from),
        )
    }

    pub(crate) fn from_parts(
        array_offset: usize,
        position_count: usize,
        slice: Bytes,
        offsets: Arc<[u32]>,
        value_is_null: Option<Arc<[bool]>>,
    ) -> Result<Self, BlockError> {
        if offsets.len() < array_offset + position_count + 1 {
            return Err(BlockError::InsufficientStorage(
                "offsets length is less than positionCount".into(),
            ));
        }
        if offsets[array_offset + position_count] as usize > slice.len() {
            return Err(BlockError::InsufficientStorage(
                "slice is shorter than the last offset".into(),
            ));
        }
        if let Some(nulls) = &value_is_null {
            if nulls.len() < array_offset + position_count {
                return Err(BlockError::InsufficientStorage(
                    "isNull length is less than positionCount".into(),
                ));
            }
        }
        Ok(Self {
            array_offset,
            position_count,
            slice,
            offsets,
            value_is_null,
        })
    }

    fn bounds(&self, position: usize) -> (usize, usize) {
        let index = position + self.array_offset;
        (
            self.offsets[index] as usize,
            self.offsets[index + 1] as usize,
        )
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn slice_length(&self, position: usize) -> Result<usize, BlockError> {
        check_readable_position(position, self.position_count)?;
        let (start, end) = self.bounds(position);
        Ok(end - start)
    }

    pub fn size_in_bytes(&self) -> u64 {
        let start = self.offsets[self.array_offset] as u64;
        let end = self.offsets[self.array_offset + self.position_count] as u64;
        (end - start) + (4 + 1) * self.position_count as u64
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + self.slice.len() as u64
            + 4 * self.offsets.len() as u64
            + nulls_retained_size(self.value_is_null.as_deref())
    }

    pub fn may_have_null(&self) -> bool {
        self.value_is_null.is_some()
    }

    pub fn is_null(&self, position: usize) -> Result<bool, BlockError> {
        check_readable_position(position, self.position_count)?;
        Ok(self
            .value_is_null
            .as_ref()
            .is_some_and(|nulls| nulls[position + self.array_offset]))
    }

    /// Zero-copy view of the bytes at `position`.
    pub fn get_slice(&self, position: usize) -> Result<Bytes, BlockError> {
        check_readable_position(position, self.position_count)?;
        let (start, end) = self.bounds(position);
        Ok(self.slice.slice(start..end))
    }

    pub fn write_position_to(
        &self,
        position: usize,
        builder: &mut BlockBuilder,
    ) -> Result<(), BlockError> {
        if self.is_null(position)? {
            return builder.append_null();
        }
        let (start, end) = self.bounds(position);
        builder.write_bytes(&self.slice[start..end])?;
        builder.close_entry()
    }

    pub fn get_single_value_block(&self, position: usize) -> Result<Block, BlockError> {
        let is_null = self.is_null(position)?;
        let (start, end) = self.bounds(position);
        let data = Bytes::copy_from_slice(&self.slice[start..end]);
        let length = data.len() as u32;
        Ok(Block::VariableWidth(VariableWidthBlock::new(
            1,
            data,
            vec![0, length],
            is_null.then(|| vec![true]),
        )?))
    }

    pub fn copy_positions(&self, positions: &[usize]) -> Result<Block, BlockError> {
        check_valid_positions(positions, self.position_count)?;
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(positions.len() + 1);
        offsets.push(0u32);
        for &position in positions {
            let (start, end) = self.bounds(position);
            data.extend_from_slice(&self.slice[start..end]);
            offsets.push(data.len() as u32);
        }
        let nulls = gather_nulls(self.value_is_null.as_deref(), self.array_offset, positions);
        Ok(Block::VariableWidth(VariableWidthBlock::new(
            positions.len(),
            Bytes::from(data),
            offsets,
            nulls,
        )?))
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        check_valid_region(self.position_count, offset, length)?;
        Ok(Block::VariableWidth(VariableWidthBlock::from_parts(
            self.array_offset + offset,
            length,
            self.slice.clone(),
            Arc::clone(&self.offsets),
            self.value_is_null.clone(),
        )?))
    }

    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        check_valid_region(self.position_count, offset, length)?;
        let first = self.array_offset + offset;
        let base = self.offsets[first];
        let end = self.offsets[first + length];
        let offsets = self.offsets[first..=first + length]
            .iter()
            .map(|o| o - base)
            .collect();
        let data = Bytes::copy_from_slice(&self.slice[base as usize..end as usize]);
        let nulls = compact_nulls(self.value_is_null.as_deref(), first, length);
        Ok(Block::VariableWidth(VariableWidthBlock::new(
            length, data, offsets, nulls,
        )?))
    }
}
