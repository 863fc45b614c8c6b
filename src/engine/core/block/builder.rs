use bytes::Bytes;

use super::block_util::{calculate_block_reset_size, calculate_new_array_size, MAX_ARRAY_SIZE};
use super::{
    Block, BlockEncoding, ByteArrayBlock, Int128ArrayBlock, LongArrayBlock, RunLengthEncodedBlock,
    VariableWidthBlock,
};
use crate::engine::errors::BlockError;

const DEFAULT_EXPECTED_BYTES_PER_ENTRY: usize = 16;

/// Null tracking shared by every builder kind.
#[derive(Debug, Default)]
struct NullTracker {
    value_is_null: Vec<bool>,
    has_null_value: bool,
    has_non_null_value: bool,
}

impl NullTracker {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            value_is_null: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    fn push(&mut self, is_null: bool) {
        grow(&mut self.value_is_null);
        self.value_is_null.push(is_null);
        if is_null {
            self.has_null_value = true;
        } else {
            self.has_non_null_value = true;
        }
    }

    fn len(&self) -> usize {
        self.value_is_null.len()
    }

    fn take(self) -> Option<Vec<bool>> {
        self.has_null_value.then_some(self.value_is_null)
    }
}

/// Doubles the backing capacity when full, up to `MAX_ARRAY_SIZE`.
fn grow<T>(values: &mut Vec<T>) {
    if values.len() == values.capacity() {
        let target = calculate_new_array_size(values.capacity()).min(MAX_ARRAY_SIZE);
        values.reserve_exact(target.saturating_sub(values.len()));
    }
}

#[derive(Debug)]
pub struct FixedWidthBuilder<T> {
    words_per_entry: usize,
    values: Vec<T>,
    nulls: NullTracker,
    entry_words: usize,
}

impl<T: Copy + Default> FixedWidthBuilder<T> {
    fn new(expected_entries: usize, words_per_entry: usize) -> Self {
        let capacity = expected_entries.max(1);
        Self {
            words_per_entry,
            values: Vec::with_capacity(capacity * words_per_entry),
            nulls: NullTracker::with_capacity(capacity),
            entry_words: 0,
        }
    }

    fn write(&mut self, value: T) -> Result<(), BlockError> {
        if self.entry_words >= self.words_per_entry {
            return Err(BlockError::EntrySize {
                expected: self.words_per_entry,
                actual: self.entry_words + 1,
            });
        }
        grow(&mut self.values);
        self.values.push(value);
        self.entry_words += 1;
        Ok(())
    }

    fn close_entry(&mut self) -> Result<(), BlockError> {
        if self.entry_words != self.words_per_entry {
            return Err(BlockError::EntrySize {
                expected: self.words_per_entry,
                actual: self.entry_words,
            });
        }
        self.entry_words = 0;
        self.nulls.push(false);
        Ok(())
    }

    fn append_null(&mut self) -> Result<(), BlockError> {
        if self.entry_words > 0 {
            return Err(BlockError::EntryNotClosed);
        }
        for _ in 0..self.words_per_entry {
            grow(&mut self.values);
            self.values.push(T::default());
        }
        self.nulls.push(true);
        Ok(())
    }

    fn retained_size_in_bytes(&self) -> u64 {
        (std::mem::size_of::<T>() * self.values.capacity() + self.nulls.value_is_null.capacity())
            as u64
    }
}

#[derive(Debug)]
pub struct VariableWidthBuilder {
    data: Vec<u8>,
    offsets: Vec<u32>,
    nulls: NullTracker,
    entry_bytes: usize,
}

impl VariableWidthBuilder {
    fn new(expected_entries: usize, expected_bytes_per_entry: usize) -> Self {
        let capacity = expected_entries.max(1);
        let mut offsets = Vec::with_capacity(capacity + 1);
        offsets.push(0);
        Self {
            data: Vec::with_capacity(capacity * expected_bytes_per_entry),
            offsets,
            nulls: NullTracker::with_capacity(capacity),
            entry_bytes: 0,
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.entry_bytes += bytes.len();
    }

    fn close_entry(&mut self, is_null: bool) {
        grow(&mut self.offsets);
        self.offsets.push(self.data.len() as u32);
        self.nulls.push(is_null);
        self.entry_bytes = 0;
    }

    fn average_entry_size(&self) -> usize {
        match self.nulls.len() {
            0 => DEFAULT_EXPECTED_BYTES_PER_ENTRY,
            n => (self.data.len() / n).max(1),
        }
    }
}

/// Append-only builder producing one block. Each entry is written with one or
/// more `write_*` calls followed by `close_entry`, or with `append_null`.
#[derive(Debug)]
pub enum BlockBuilder {
    Long(FixedWidthBuilder<i64>),
    Int128(FixedWidthBuilder<i64>),
    Byte(FixedWidthBuilder<u8>),
    VariableWidth(VariableWidthBuilder),
}

impl BlockBuilder {
    pub fn long(expected_entries: usize) -> Self {
        BlockBuilder::Long(FixedWidthBuilder::new(expected_entries, 1))
    }

    pub fn int128(expected_entries: usize) -> Self {
        BlockBuilder::Int128(FixedWidthBuilder::new(expected_entries, 2))
    }

    pub fn byte(expected_entries: usize) -> Self {
        BlockBuilder::Byte(FixedWidthBuilder::new(expected_entries, 1))
    }

    pub fn variable_width(expected_entries: usize, expected_bytes_per_entry: usize) -> Self {
        BlockBuilder::VariableWidth(VariableWidthBuilder::new(
            expected_entries,
            expected_bytes_per_entry,
        ))
    }

    pub fn encoding(&self) -> BlockEncoding {
        match self {
            BlockBuilder::Long(_) => BlockEncoding::LongArray,
            BlockBuilder::Int128(_) => BlockEncoding::Int128Array,
            BlockBuilder::Byte(_) => BlockEncoding::ByteArray,
            BlockBuilder::VariableWidth(_) => BlockEncoding::VariableWidth,
        }
    }

    fn unsupported(&self, operation: &'static str) -> BlockError {
        BlockError::Unsupported {
            operation,
            encoding: self.encoding().name(),
        }
    }

    pub fn write_long(&mut self, value: i64) -> Result<(), BlockError> {
        match self {
            BlockBuilder::Long(b) | BlockBuilder::Int128(b) => b.write(value),
            _ => Err(self.unsupported("writeLong")),
        }
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), BlockError> {
        match self {
            BlockBuilder::Byte(b) => b.write(value),
            BlockBuilder::VariableWidth(b) => {
                b.write_bytes(&[value]);
                Ok(())
            }
            _ => Err(self.unsupported("writeByte")),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BlockError> {
        match self {
            BlockBuilder::VariableWidth(b) => {
                b.write_bytes(bytes);
                Ok(())
            }
            _ => Err(self.unsupported("writeBytes")),
        }
    }

    pub fn close_entry(&mut self) -> Result<(), BlockError> {
        match self {
            BlockBuilder::Long(b) | BlockBuilder::Int128(b) => b.close_entry(),
            BlockBuilder::Byte(b) => b.close_entry(),
            BlockBuilder::VariableWidth(b) => {
                b.close_entry(false);
                Ok(())
            }
        }
    }

    pub fn append_null(&mut self) -> Result<(), BlockError> {
        match self {
            BlockBuilder::Long(b) | BlockBuilder::Int128(b) => b.append_null(),
            BlockBuilder::Byte(b) => b.append_null(),
            BlockBuilder::VariableWidth(b) => {
                if b.entry_bytes > 0 {
                    return Err(BlockError::EntryNotClosed);
                }
                b.close_entry(true);
                Ok(())
            }
        }
    }

    pub fn position_count(&self) -> usize {
        match self {
            BlockBuilder::Long(b) | BlockBuilder::Int128(b) => b.nulls.len(),
            BlockBuilder::Byte(b) => b.nulls.len(),
            BlockBuilder::VariableWidth(b) => b.nulls.len(),
        }
    }

    pub fn size_in_bytes(&self) -> u64 {
        let count = self.position_count() as u64;
        match self {
            BlockBuilder::Long(_) => 9 * count,
            BlockBuilder::Int128(_) => 17 * count,
            BlockBuilder::Byte(_) => 2 * count,
            BlockBuilder::VariableWidth(b) => b.data.len() as u64 + 5 * count,
        }
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        let fields = std::mem::size_of::<Self>() as u64;
        fields
            + match self {
                BlockBuilder::Long(b) | BlockBuilder::Int128(b) => b.retained_size_in_bytes(),
                BlockBuilder::Byte(b) => b.retained_size_in_bytes(),
                BlockBuilder::VariableWidth(b) => {
                    (b.data.capacity()
                        + 4 * b.offsets.capacity()
                        + b.nulls.value_is_null.capacity()) as u64
                }
            }
    }

    /// A fresh, empty builder of the same kind sized from this one's row count.
    pub fn new_block_builder_like(&self) -> BlockBuilder {
        let expected = calculate_block_reset_size(self.position_count());
        match self {
            BlockBuilder::Long(_) => BlockBuilder::long(expected),
            BlockBuilder::Int128(_) => BlockBuilder::int128(expected),
            BlockBuilder::Byte(_) => BlockBuilder::byte(expected),
            BlockBuilder::VariableWidth(b) => {
                BlockBuilder::variable_width(expected, b.average_entry_size())
            }
        }
    }

    fn has_open_entry(&self) -> bool {
        match self {
            BlockBuilder::Long(b) | BlockBuilder::Int128(b) => b.entry_words > 0,
            BlockBuilder::Byte(b) => b.entry_words > 0,
            BlockBuilder::VariableWidth(b) => b.entry_bytes > 0,
        }
    }

    /// Finishes the block. A builder that only saw nulls collapses to a
    /// run-length block over one null value.
    pub fn build(self) -> Result<Block, BlockError> {
        if self.has_open_entry() {
            return Err(BlockError::EntryNotClosed);
        }
        let position_count = self.position_count();
        let all_null = position_count > 0
            && match &self {
                BlockBuilder::Long(b) | BlockBuilder::Int128(b) => !b.nulls.has_non_null_value,
                BlockBuilder::Byte(b) => !b.nulls.has_non_null_value,
                BlockBuilder::VariableWidth(b) => !b.nulls.has_non_null_value,
            };
        if all_null {
            let null_value = null_block(self.encoding())?;
            return Ok(Block::RunLengthEncoded(RunLengthEncodedBlock::new(
                null_value,
                position_count,
            )?));
        }

        match self {
            BlockBuilder::Long(b) => {
                Ok(Block::LongArray(LongArrayBlock::new(
                    position_count,
                    b.nulls.take(),
                    b.values,
                )?))
            }
            BlockBuilder::Int128(b) => {
                Ok(Block::Int128Array(Int128ArrayBlock::new(
                    position_count,
                    b.nulls.take(),
                    b.values,
                )?))
            }
            BlockBuilder::Byte(b) => {
                Ok(Block::ByteArray(ByteArrayBlock::new(
                    position_count,
                    b.nulls.take(),
                    b.values,
                )?))
            }
            BlockBuilder::VariableWidth(b) => {
                Ok(Block::VariableWidth(VariableWidthBlock::new(
                    position_count,
                    Bytes::from(b.data),
                    b.offsets,
                    b.nulls.take(),
                )?))
            }
        }
    }
}

/// Single-position null block of the given encoding.
pub fn null_block(encoding: BlockEncoding) -> Result<Block, BlockError> {
    let nulls = Some(vec![true]);
    match encoding {
        BlockEncoding::LongArray => Ok(Block::LongArray(LongArrayBlock::new(1, nulls, vec![0])?)),
        BlockEncoding::Int128Array => Ok(Block::Int128Array(Int128ArrayBlock::new(
            1,
            nulls,
            vec![0, 0],
        )?)),
        BlockEncoding::ByteArray => Ok(Block::ByteArray(ByteArrayBlock::new(1, nulls, vec![0])?)),
        BlockEncoding::VariableWidth => Ok(Block::VariableWidth(VariableWidthBlock::new(
            1,
            Bytes::new(),
            vec![0, 0],
            nulls,
        )?)),
        other => Err(BlockError::Unsupported {
            operation: "nullBlock",
            encoding: other.name(),
        }),
    }
}
