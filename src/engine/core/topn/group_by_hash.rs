use rustc_hash::FxHashMap;

use crate::engine::core::page::Page;
use crate::engine::errors::PageError;
use crate::engine::types::Type;

/// Assigns dense group ids, in first-seen order, to the distinct values of
/// the group-by channels. Without channels every row belongs to group 0.
#[derive(Debug)]
pub struct GroupByHash {
    types: Vec<Type>,
    channels: Vec<usize>,
    groups: FxHashMap<Vec<u8>, u32>,
    key_bytes: u64,
    key: Vec<u8>,
}

impl GroupByHash {
    pub fn new(types: Vec<Type>, channels: Vec<usize>) -> Self {
        Self {
            types,
            channels,
            groups: FxHashMap::default(),
            key_bytes: 0,
            key: Vec::new(),
        }
    }

    pub fn group_count(&self) -> usize {
        if self.channels.is_empty() {
            1
        } else {
            self.groups.len()
        }
    }

    pub fn estimated_size_in_bytes(&self) -> u64 {
        self.key_bytes + (self.groups.capacity() * (24 + 4)) as u64
    }

    pub fn get_group_ids(&mut self, page: &Page) -> Result<Vec<u32>, PageError> {
        let count = page.position_count();
        if self.channels.is_empty() {
            return Ok(vec![0; count]);
        }
        let mut ids = Vec::with_capacity(count);
        for position in 0..count {
            self.key.clear();
            for &channel in &self.channels {
                let ty = self
                    .types
                    .get(channel)
                    .ok_or(PageError::ChannelOutOfBounds(channel))?;
                ty.append_key_bytes(page.block(channel)?, position, &mut self.key)?;
            }
            let next_id = self.groups.len() as u32;
            let id = match self.groups.get(self.key.as_slice()) {
                Some(id) => *id,
                None => {
                    self.key_bytes += self.key.len() as u64;
                    self.groups.insert(self.key.clone(), next_id);
                    next_id
                }
            };
            ids.push(id);
        }
        Ok(ids)
    }
}
