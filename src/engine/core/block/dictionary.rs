use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::block_util::{check_readable_position, check_valid_positions, check_valid_region};
use super::{Block, BlockBuilder};
use crate::engine::errors::BlockError;

/// Positions hold ids into a shared dictionary block.
#[derive(Debug, Clone)]
pub struct DictionaryBlock {
    ids_offset: usize,
    position_count: usize,
    dictionary: Arc<Block>,
    ids: Arc<[u32]>,
}

impl DictionaryBlock {
    pub fn new(position_count: usize, dictionary: Block, ids: Vec<u32>) -> Result<Self, BlockError> {
        Self::from_parts(0, position_count, Arc::new(dictionary), Arc::from(ids))
    }

    pub(crate) fn from_parts(
        ids_offset: usize,
        position_count: usize,
        dictionary: Arc<Block>,
        ids: Arc<[u32]>,
    ) -> Result<Self, BlockError> {
        if ids.len() < ids_offset + position_count {
            return Err(BlockError::InsufficientStorage(
                "ids length is less than positionCount".into(),
            ));
        }
        let dictionary_size = dictionary.position_count();
        if let Some(bad) = ids[ids_offset..ids_offset + position_count]
            .iter()
            .find(|id| **id as usize >= dictionary_size)
        {
            return Err(BlockError::PositionOutOfBounds {
                position: *bad as usize,
                count: dictionary_size,
            });
        }
        Ok(Self {
            ids_offset,
            position_count,
            dictionary,
            ids,
        })
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn dictionary(&self) -> &Block {
        &self.dictionary
    }

    pub fn id(&self, position: usize) -> Result<usize, BlockError> {
        check_readable_position(position, self.position_count)?;
        Ok(self.ids[position + self.ids_offset] as usize)
    }

    pub fn size_in_bytes(&self) -> u64 {
        let dictionary_count = self.dictionary.position_count().max(1) as u64;
        let per_entry = self.dictionary.size_in_bytes() / dictionary_count;
        (per_entry + 4) * self.position_count as u64
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        std::mem::size_of::<Self>() as u64
            + 4 * self.ids.len() as u64
            + self.dictionary.retained_size_in_bytes()
    }

    pub fn may_have_null(&self) -> bool {
        self.dictionary.may_have_null()
    }

    pub fn is_null(&self, position: usize) -> Result<bool, BlockError> {
        self.dictionary.is_null(self.id(position)?)
    }

    pub fn write_position_to(
        &self,
        position: usize,
        builder: &mut BlockBuilder,
    ) -> Result<(), BlockError> {
        self.dictionary.write_position_to(self.id(position)?, builder)
    }

    pub fn get_single_value_block(&self, position: usize) -> Result<Block, BlockError> {
        self.dictionary.get_single_value_block(self.id(position)?)
    }

    pub fn copy_positions(&self, positions: &[usize]) -> Result<Block, BlockError> {
        check_valid_positions(positions, self.position_count)?;
        let ids: Vec<u32> = positions
            .iter()
            .map(|p| self.ids[p + self.ids_offset])
            .collect();
        self.compacted(ids)
    }

    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        check_valid_region(self.position_count, offset, length)?;
        Ok(Block::Dictionary(DictionaryBlock::from_parts(
            self.ids_offset + offset,
            length,
            Arc::clone(&self.dictionary),
            Arc::clone(&self.ids),
        )?))
    }

    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        check_valid_region(self.position_count, offset, length)?;
        let start = self.ids_offset + offset;
        self.compacted(self.ids[start..start + length].to_vec())
    }

    /// Keeps only the dictionary entries `ids` reference and renumbers them.
    fn compacted(&self, ids: Vec<u32>) -> Result<Block, BlockError> {
        let mut remap: FxHashMap<u32, u32> = FxHashMap::default();
        let mut used = Vec::new();
        let mut new_ids = Vec::with_capacity(ids.len());
        for id in ids {
            let next = remap.len() as u32;
            let mapped = *remap.entry(id).or_insert_with(|| {
                used.push(id as usize);
                next
            });
            new_ids.push(mapped);
        }
        let dictionary = self.dictionary.copy_positions(&used)?;
        Ok(Block::Dictionary(DictionaryBlock::new(
            new_ids.len(),
            dictionary,
            new_ids,
        )?))
    }
}
