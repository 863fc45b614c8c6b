mod scalar;
mod sort_order;

#[cfg(test)]
mod types_test;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use scalar::ScalarValue;
pub use sort_order::SortOrder;

use crate::engine::core::block::{Block, BlockBuilder};
use crate::engine::errors::BlockError;

const EXPECTED_VARCHAR_BYTES: usize = 32;

/// Column types understood by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Boolean,
    BigInt,
    Double,
    Int128,
    Varchar,
}

impl Type {
    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Boolean => "boolean",
            Type::BigInt => "bigint",
            Type::Double => "double",
            Type::Int128 => "int128",
            Type::Varchar => "varchar",
        }
    }

    pub fn create_block_builder(&self, expected_entries: usize) -> BlockBuilder {
        match self {
            Type::Boolean => BlockBuilder::byte(expected_entries),
            Type::BigInt | Type::Double => BlockBuilder::long(expected_entries),
            Type::Int128 => BlockBuilder::int128(expected_entries),
            Type::Varchar => BlockBuilder::variable_width(expected_entries, EXPECTED_VARCHAR_BYTES),
        }
    }

    fn mismatch(&self, value: &ScalarValue) -> BlockError {
        BlockError::TypeMismatch(format!("cannot write {} into a {} column", value, self))
    }

    pub fn get_value(&self, block: &Block, position: usize) -> Result<ScalarValue, BlockError> {
        if block.is_null(position)? {
            return Ok(ScalarValue::Null);
        }
        Ok(match self {
            Type::Boolean => ScalarValue::Boolean(block.get_byte(position)? != 0),
            Type::BigInt => ScalarValue::BigInt(block.get_long(position, 0)?),
            Type::Double => ScalarValue::Double(f64::from_bits(block.get_long(position, 0)? as u64)),
            Type::Int128 => ScalarValue::Int128(block.get_int128(position)?),
            Type::Varchar => {
                let bytes = block.get_slice(position)?;
                ScalarValue::Varchar(String::from_utf8_lossy(&bytes).into_owned())
            }
        })
    }

    pub fn write_value(
        &self,
        builder: &mut BlockBuilder,
        value: &ScalarValue,
    ) -> Result<(), BlockError> {
        match (self, value) {
            (_, ScalarValue::Null) => return builder.append_null(),
            (Type::Boolean, ScalarValue::Boolean(v)) => builder.write_byte(u8::from(*v))?,
            (Type::BigInt, ScalarValue::BigInt(v)) => builder.write_long(*v)?,
            (Type::Double, ScalarValue::Double(v)) => builder.write_long(v.to_bits() as i64)?,
            (Type::Int128, ScalarValue::Int128(v)) => {
                builder.write_long(*v as i64)?;
                builder.write_long((*v >> 64) as i64)?;
            }
            (Type::Varchar, ScalarValue::Varchar(v)) => builder.write_bytes(v.as_bytes())?,
            _ => return Err(self.mismatch(value)),
        }
        builder.close_entry()
    }

    /// Compares two non-null positions.
    pub fn compare(
        &self,
        left: &Block,
        left_position: usize,
        right: &Block,
        right_position: usize,
    ) -> Result<Ordering, BlockError> {
        Ok(match self {
            Type::Boolean => left
                .get_byte(left_position)?
                .cmp(&right.get_byte(right_position)?),
            Type::BigInt => left
                .get_long(left_position, 0)?
                .cmp(&right.get_long(right_position, 0)?),
            Type::Double => {
                let l = f64::from_bits(left.get_long(left_position, 0)? as u64);
                let r = f64::from_bits(right.get_long(right_position, 0)? as u64);
                l.total_cmp(&r)
            }
            Type::Int128 => left
                .get_int128(left_position)?
                .cmp(&right.get_int128(right_position)?),
            Type::Varchar => left
                .get_slice(left_position)?
                .cmp(&right.get_slice(right_position)?),
        })
    }

    /// Null-aware equality: two nulls are equal (IS NOT DISTINCT FROM).
    pub fn equal(
        &self,
        left: &Block,
        left_position: usize,
        right: &Block,
        right_position: usize,
    ) -> Result<bool, BlockError> {
        let left_null = left.is_null(left_position)?;
        let right_null = right.is_null(right_position)?;
        if left_null || right_null {
            return Ok(left_null && right_null);
        }
        Ok(self.compare(left, left_position, right, right_position)? == Ordering::Equal)
    }

    pub fn append_to(
        &self,
        block: &Block,
        position: usize,
        builder: &mut BlockBuilder,
    ) -> Result<(), BlockError> {
        block.write_position_to(position, builder)
    }

    /// Appends a self-delimiting encoding of the position to `out`, so that equal
    /// values (and nulls) produce equal byte strings.
    pub fn append_key_bytes(
        &self,
        block: &Block,
        position: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), BlockError> {
        if block.is_null(position)? {
            out.push(0);
            return Ok(());
        }
        out.push(1);
        match self {
            Type::Boolean => out.push(block.get_byte(position)?),
            Type::BigInt | Type::Double => {
                out.extend_from_slice(&block.get_long(position, 0)?.to_le_bytes())
            }
            Type::Int128 => out.extend_from_slice(&block.get_int128(position)?.to_le_bytes()),
            Type::Varchar => {
                let bytes = block.get_slice(position)?;
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(&bytes);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
