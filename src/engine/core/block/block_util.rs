use crate::engine::errors::BlockError;

/// Upper bound on a single backing array, in entries.
pub const MAX_ARRAY_SIZE: usize = i32::MAX as usize - 8;

pub(crate) fn check_valid_region(
    position_count: usize,
    offset: usize,
    length: usize,
) -> Result<(), BlockError> {
    if offset > position_count || length > position_count - offset {
        return Err(BlockError::InvalidRegion {
            offset,
            length,
            count: position_count,
        });
    }
    Ok(())
}

pub(crate) fn check_readable_position(position: usize, count: usize) -> Result<(), BlockError> {
    if position >= count {
        return Err(BlockError::PositionOutOfBounds { position, count });
    }
    Ok(())
}

pub(crate) fn check_valid_positions(positions: &[usize], count: usize) -> Result<(), BlockError> {
    for &position in positions {
        check_readable_position(position, count)?;
    }
    Ok(())
}

/// Capacity after one growth step; arrays double until the hard limit.
pub fn calculate_new_array_size(current: usize) -> usize {
    current.saturating_mul(2).clamp(1, MAX_ARRAY_SIZE)
}

/// Expected entries for the builder of the next batch, sized from the rows the
/// previous builder actually saw.
pub fn calculate_block_reset_size(position_count: usize) -> usize {
    position_count.clamp(1, MAX_ARRAY_SIZE)
}

pub(crate) fn compact_nulls(
    value_is_null: Option<&[bool]>,
    offset: usize,
    length: usize,
) -> Option<Vec<bool>> {
    value_is_null.map(|nulls| nulls[offset..offset + length].to_vec())
}

pub(crate) fn gather_nulls(
    value_is_null: Option<&[bool]>,
    base: usize,
    positions: &[usize],
) -> Option<Vec<bool>> {
    value_is_null.map(|nulls| positions.iter().map(|p| nulls[base + p]).collect())
}

pub(crate) fn nulls_retained_size(value_is_null: Option<&[bool]>) -> u64 {
    value_is_null.map(|n| n.len() as u64).unwrap_or(0)
}
