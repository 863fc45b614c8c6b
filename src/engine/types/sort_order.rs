use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::Type;
use crate::engine::core::block::Block;
use crate::engine::errors::BlockError;

/// Sort direction plus null placement. Null placement does not flip with direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl SortOrder {
    pub fn is_ascending(&self) -> bool {
        matches!(self, SortOrder::AscNullsFirst | SortOrder::AscNullsLast)
    }

    pub fn is_nulls_first(&self) -> bool {
        matches!(self, SortOrder::AscNullsFirst | SortOrder::DescNullsFirst)
    }

    pub fn compare(
        &self,
        ty: Type,
        left: &Block,
        left_position: usize,
        right: &Block,
        right_position: usize,
    ) -> Result<Ordering, BlockError> {
        let left_null = left.is_null(left_position)?;
        let right_null = right.is_null(right_position)?;
        match (left_null, right_null) {
            (true, true) => return Ok(Ordering::Equal),
            (true, false) => {
                return Ok(if self.is_nulls_first() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                });
            }
            (false, true) => {
                return Ok(if self.is_nulls_first() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                });
            }
            (false, false) => {}
        }
        let ordering = ty.compare(left, left_position, right, right_position)?;
        Ok(if self.is_ascending() {
            ordering
        } else {
            ordering.reverse()
        })
    }
}
