use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::engine::core::block::{
    Block, BlockEncoding, ByteArrayBlock, DictionaryBlock, Int128ArrayBlock, LongArrayBlock,
    RunLengthEncodedBlock, VariableWidthBlock,
};
use crate::engine::errors::SerdeError;

/// Writes `u32 name length | name | body`. Bodies start with the position
/// count and a null section; only non-null values are written.
pub fn write_block(block: &Block, out: &mut BytesMut) -> Result<(), SerdeError> {
    let name = block.encoding().name();
    out.put_u32_le(name.len() as u32);
    out.put_slice(name.as_bytes());

    let count = block.position_count();
    out.put_u32_le(count as u32);
    match block {
        Block::LongArray(_) => {
            let nulls = write_nulls(block, out)?;
            for position in non_null(&nulls, count) {
                out.put_i64_le(block.get_long(position, 0)?);
            }
        }
        Block::Int128Array(_) => {
            let nulls = write_nulls(block, out)?;
            for position in non_null(&nulls, count) {
                out.put_i64_le(block.get_long(position, 0)?);
                out.put_i64_le(block.get_long(position, 8)?);
            }
        }
        Block::ByteArray(_) => {
            let nulls = write_nulls(block, out)?;
            for position in non_null(&nulls, count) {
                out.put_u8(block.get_byte(position)?);
            }
        }
        Block::VariableWidth(_) => {
            let nulls = write_nulls(block, out)?;
            let mut data = Vec::new();
            for position in 0..count {
                if nulls.get(position).copied().unwrap_or(false) {
                    out.put_u32_le(0);
                    continue;
                }
                let slice = block.get_slice(position)?;
                out.put_u32_le(slice.len() as u32);
                data.extend_from_slice(&slice);
            }
            out.put_u32_le(data.len() as u32);
            out.put_slice(&data);
        }
        Block::Dictionary(dictionary) => {
            write_block(dictionary.dictionary(), out)?;
            for position in 0..count {
                out.put_u32_le(dictionary.id(position)? as u32);
            }
        }
        Block::RunLengthEncoded(rle) => {
            write_block(rle.value(), out)?;
        }
    }
    Ok(())
}

fn write_nulls(block: &Block, out: &mut BytesMut) -> Result<Vec<bool>, SerdeError> {
    let count = block.position_count();
    if !block.may_have_null() {
        out.put_u8(0);
        return Ok(Vec::new());
    }
    let nulls = (0..count)
        .map(|p| block.is_null(p))
        .collect::<Result<Vec<_>, _>>()?;
    out.put_u8(1);
    for chunk in nulls.chunks(8) {
        let mut byte = 0u8;
        for (bit, is_null) in chunk.iter().enumerate() {
            if *is_null {
                byte |= 1 << bit;
            }
        }
        out.put_u8(byte);
    }
    Ok(nulls)
}

fn non_null(nulls: &[bool], count: usize) -> impl Iterator<Item = usize> + '_ {
    (0..count).filter(move |p| !nulls.get(*p).copied().unwrap_or(false))
}

fn ensure(buf: &Bytes, needed: usize, what: &'static str) -> Result<(), SerdeError> {
    if buf.remaining() < needed {
        return Err(SerdeError::UnexpectedEof(what));
    }
    Ok(())
}

fn read_u32(buf: &mut Bytes, what: &'static str) -> Result<u32, SerdeError> {
    ensure(buf, 4, what)?;
    Ok(buf.get_u32_le())
}

/// Capacity for `count` entries, bounded by what the frame can still hold.
fn capacity(buf: &Bytes, count: usize) -> usize {
    count.min(buf.remaining())
}

fn read_nulls(buf: &mut Bytes, count: usize) -> Result<Option<Vec<bool>>, SerdeError> {
    ensure(buf, 1, "null flag")?;
    if buf.get_u8() == 0 {
        return Ok(None);
    }
    let packed = count.div_ceil(8);
    ensure(buf, packed, "null bitmap")?;
    let bitmap = buf.split_to(packed);
    Ok(Some(
        (0..count)
            .map(|p| bitmap[p / 8] & (1 << (p % 8)) != 0)
            .collect(),
    ))
}

fn is_null_at(nulls: &Option<Vec<bool>>, position: usize) -> bool {
    nulls.as_ref().is_some_and(|n| n[position])
}

pub fn read_block(buf: &mut Bytes) -> Result<Block, SerdeError> {
    let name_len = read_u32(buf, "encoding name length")? as usize;
    ensure(buf, name_len, "encoding name")?;
    let name_bytes = buf.split_to(name_len);
    let name = String::from_utf8_lossy(&name_bytes).into_owned();
    let encoding =
        BlockEncoding::from_name(&name).ok_or_else(|| SerdeError::UnknownEncoding(name.clone()))?;

    let count = read_u32(buf, "position count")? as usize;
    let block = match encoding {
        BlockEncoding::LongArray => {
            let nulls = read_nulls(buf, count)?;
            let mut values = Vec::with_capacity(capacity(buf, count));
            for position in 0..count {
                if is_null_at(&nulls, position) {
                    values.push(0);
                } else {
                    ensure(buf, 8, "long value")?;
                    values.push(buf.get_i64_le());
                }
            }
            Block::LongArray(LongArrayBlock::new(count, nulls, values)?)
        }
        BlockEncoding::Int128Array => {
            let nulls = read_nulls(buf, count)?;
            let mut values = Vec::with_capacity(capacity(buf, count).saturating_mul(2));
            for position in 0..count {
                if is_null_at(&nulls, position) {
                    values.extend_from_slice(&[0, 0]);
                } else {
                    ensure(buf, 16, "int128 value")?;
                    values.push(buf.get_i64_le());
                    values.push(buf.get_i64_le());
                }
            }
            Block::Int128Array(Int128ArrayBlock::new(count, nulls, values)?)
        }
        BlockEncoding::ByteArray => {
            let nulls = read_nulls(buf, count)?;
            let mut values = Vec::with_capacity(capacity(buf, count));
            for position in 0..count {
                if is_null_at(&nulls, position) {
                    values.push(0);
                } else {
                    ensure(buf, 1, "byte value")?;
                    values.push(buf.get_u8());
                }
            }
            Block::ByteArray(ByteArrayBlock::new(count, nulls, values)?)
        }
        BlockEncoding::VariableWidth => {
            let nulls = read_nulls(buf, count)?;
            let mut offsets = Vec::with_capacity(capacity(buf, count) + 1);
            offsets.push(0u32);
            let mut total = 0u32;
            for _ in 0..count {
                total = total
                    .checked_add(read_u32(buf, "slice length")?)
                    .ok_or(SerdeError::Corrupt("slice lengths overflow"))?;
                offsets.push(total);
            }
            let data_len = read_u32(buf, "slice data length")? as usize;
            if data_len != total as usize {
                return Err(SerdeError::UnexpectedEof("slice data"));
            }
            ensure(buf, data_len, "slice data")?;
            let data = buf.split_to(data_len);
            Block::VariableWidth(VariableWidthBlock::new(count, data, offsets, nulls)?)
        }
        BlockEncoding::Dictionary => {
            let dictionary = read_block(buf)?;
            let mut ids = Vec::with_capacity(capacity(buf, count));
            for _ in 0..count {
                ids.push(read_u32(buf, "dictionary id")?);
            }
            Block::Dictionary(DictionaryBlock::new(count, dictionary, ids)?)
        }
        BlockEncoding::RunLengthEncoded => {
            let value = read_block(buf)?;
            Block::RunLengthEncoded(RunLengthEncodedBlock::new(value, count)?)
        }
    };
    Ok(block)
}
