pub mod block_util;
pub mod builder;
pub mod byte_array;
pub mod dictionary;
pub mod int128_array;
pub mod long_array;
pub mod run_length;
pub mod variable_width;

#[cfg(test)]
mod block_test;
#[cfg(test)]
mod builder_test;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use builder::{BlockBuilder, null_block};
pub use byte_array::ByteArrayBlock;
pub use dictionary::DictionaryBlock;
pub use int128_array::Int128ArrayBlock;
pub use long_array::LongArrayBlock;
pub use run_length::RunLengthEncodedBlock;
pub use variable_width::VariableWidthBlock;

use crate::engine::errors::BlockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockEncoding {
    LongArray,
    Int128Array,
    ByteArray,
    VariableWidth,
    Dictionary,
    RunLengthEncoded,
}

impl BlockEncoding {
    /// Name written ahead of each block body in serialized pages.
    pub fn name(&self) -> &'static str {
        match self {
            BlockEncoding::LongArray => "LONG_ARRAY",
            BlockEncoding::Int128Array => "INT128_ARRAY",
            BlockEncoding::ByteArray => "BYTE_ARRAY",
            BlockEncoding::VariableWidth => "VARIABLE_WIDTH",
            BlockEncoding::Dictionary => "DICTIONARY",
            BlockEncoding::RunLengthEncoded => "RLE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LONG_ARRAY" => Some(BlockEncoding::LongArray),
            "INT128_ARRAY" => Some(BlockEncoding::Int128Array),
            "BYTE_ARRAY" => Some(BlockEncoding::ByteArray),
            "VARIABLE_WIDTH" => Some(BlockEncoding::VariableWidth),
            "DICTIONARY" => Some(BlockEncoding::Dictionary),
            "RLE" => Some(BlockEncoding::RunLengthEncoded),
            _ => None,
        }
    }
}

/// One column of a page. Backing arrays are shared through `Arc`, so regions are
/// cheap views while the `copy_*` operations produce compact, independent blocks.
#[derive(Debug, Clone)]
pub enum Block {
    LongArray(LongArrayBlock),
    Int128Array(Int128ArrayBlock),
    ByteArray(ByteArrayBlock),
    VariableWidth(VariableWidthBlock),
    Dictionary(DictionaryBlock),
    RunLengthEncoded(RunLengthEncodedBlock),
}

macro_rules! dispatch {
    ($self:expr, $b:ident => $body:expr) => {
        match $self {
            Block::LongArray($b) => $body,
            Block::Int128Array($b) => $body,
            Block::ByteArray($b) => $body,
            Block::VariableWidth($b) => $body,
            Block::Dictionary($b) => $body,
            Block::RunLengthEncoded($b) => $body,
        }
    };
}

impl Block {
    pub fn encoding(&self) -> BlockEncoding {
        match self {
            Block::LongArray(_) => BlockEncoding::LongArray,
            Block::Int128Array(_) => BlockEncoding::Int128Array,
            Block::ByteArray(_) => BlockEncoding::ByteArray,
            Block::VariableWidth(_) => BlockEncoding::VariableWidth,
            Block::Dictionary(_) => BlockEncoding::Dictionary,
            Block::RunLengthEncoded(_) => BlockEncoding::RunLengthEncoded,
        }
    }

    fn unsupported(&self, operation: &'static str) -> BlockError {
        BlockError::Unsupported {
            operation,
            encoding: self.encoding().name(),
        }
    }

    pub fn position_count(&self) -> usize {
        dispatch!(self, b => b.position_count())
    }

    pub fn size_in_bytes(&self) -> u64 {
        dispatch!(self, b => b.size_in_bytes())
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        dispatch!(self, b => b.retained_size_in_bytes())
    }

    pub fn may_have_null(&self) -> bool {
        dispatch!(self, b => b.may_have_null())
    }

    pub fn is_null(&self, position: usize) -> Result<bool, BlockError> {
        dispatch!(self, b => b.is_null(position))
    }

    pub fn get_long(&self, position: usize, offset: usize) -> Result<i64, BlockError> {
        match self {
            Block::LongArray(b) => b.get_long(position, offset),
            Block::Int128Array(b) => b.get_long(position, offset),
            Block::Dictionary(b) => b.dictionary().get_long(b.id(position)?, offset),
            Block::RunLengthEncoded(b) => b.value().get_long(b.value_position(position)?, offset),
            _ => Err(self.unsupported("getLong")),
        }
    }

    pub fn get_byte(&self, position: usize) -> Result<u8, BlockError> {
        match self {
            Block::ByteArray(b) => b.get_byte(position),
            Block::Dictionary(b) => b.dictionary().get_byte(b.id(position)?),
            Block::RunLengthEncoded(b) => b.value().get_byte(b.value_position(position)?),
            _ => Err(self.unsupported("getByte")),
        }
    }

    pub fn get_slice(&self, position: usize) -> Result<Bytes, BlockError> {
        match self {
            Block::VariableWidth(b) => b.get_slice(position),
            Block::Dictionary(b) => b.dictionary().get_slice(b.id(position)?),
            Block::RunLengthEncoded(b) => b.value().get_slice(b.value_position(position)?),
            _ => Err(self.unsupported("getSlice")),
        }
    }

    pub fn get_int128(&self, position: usize) -> Result<i128, BlockError> {
        match self {
            Block::Int128Array(b) => b.get_int128(position),
            Block::Dictionary(b) => b.dictionary().get_int128(b.id(position)?),
            Block::RunLengthEncoded(b) => b.value().get_int128(b.value_position(position)?),
            _ => Err(self.unsupported("getInt128")),
        }
    }

    /// Zero-copy view of `length` positions starting at `offset`.
    pub fn get_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        dispatch!(self, b => b.get_region(offset, length))
    }

    pub fn copy_region(&self, offset: usize, length: usize) -> Result<Block, BlockError> {
        dispatch!(self, b => b.copy_region(offset, length))
    }

    pub fn copy_positions(&self, positions: &[usize]) -> Result<Block, BlockError> {
        dispatch!(self, b => b.copy_positions(positions))
    }

    pub fn get_single_value_block(&self, position: usize) -> Result<Block, BlockError> {
        dispatch!(self, b => b.get_single_value_block(position))
    }

    /// Appends the value at `position` (or a null) as one closed entry.
    pub fn write_position_to(
        &self,
        position: usize,
        builder: &mut BlockBuilder,
    ) -> Result<(), BlockError> {
        dispatch!(self, b => b.write_position_to(position, builder))
    }

    /// Encoding of the values behind dictionary and run-length wrappers.
    pub fn value_encoding(&self) -> BlockEncoding {
        match self {
            Block::Dictionary(b) => b.dictionary().value_encoding(),
            Block::RunLengthEncoded(b) => b.value().value_encoding(),
            other => other.encoding(),
        }
    }
}
