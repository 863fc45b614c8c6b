use crate::engine::core::block::BlockBuilder;
use crate::engine::core::page::PagesIndex;
use crate::engine::errors::{BlockError, PageError, WindowError};
use crate::engine::types::Type;

use super::frame::FrameInfo;

/// Read access to one partition. Positions are partition-local.
#[derive(Debug, Clone, Copy)]
pub struct WindowIndex<'a> {
    index: &'a PagesIndex,
    start: usize,
    end: usize,
}

impl<'a> WindowIndex<'a> {
    pub fn new(index: &'a PagesIndex, start: usize, end: usize) -> Self {
        Self { index, start, end }
    }

    pub fn size(&self) -> usize {
        self.end - self.start
    }

    fn absolute(&self, position: usize) -> Result<usize, PageError> {
        if position >= self.size() {
            return Err(PageError::Block(BlockError::PositionOutOfBounds {
                position,
                count: self.size(),
            }));
        }
        Ok(self.start + position)
    }

    pub fn is_null(&self, channel: usize, position: usize) -> Result<bool, PageError> {
        self.index.is_null(channel, self.absolute(position)?)
    }

    pub fn get_long(&self, channel: usize, position: usize) -> Result<i64, PageError> {
        self.index.get_long(channel, self.absolute(position)?)
    }

    pub fn append_to(
        &self,
        channel: usize,
        position: usize,
        output: &mut BlockBuilder,
    ) -> Result<(), PageError> {
        self.index.append_to(channel, self.absolute(position)?, output)
    }
}

/// Where the current row sits in its partition. Peer group bounds are
/// inclusive; an empty frame is `(-1, -1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRow {
    pub position: usize,
    pub peer_group_start: usize,
    pub peer_group_end: usize,
    pub frame_start: i64,
    pub frame_end: i64,
}

impl WindowRow {
    pub fn is_empty_frame(&self) -> bool {
        self.frame_start < 0
    }

    pub fn frame_positions(&self) -> std::ops::Range<usize> {
        if self.is_empty_frame() {
            return 0..0;
        }
        self.frame_start as usize..self.frame_end as usize + 1
    }
}

pub trait WindowFunction: Send {
    fn output_type(&self) -> Type;

    /// Called once before the first row of every partition.
    fn reset(&mut self, _partition: &WindowIndex<'_>) {}

    /// Appends exactly one value for `row` to `output`.
    fn process_row(
        &mut self,
        partition: &WindowIndex<'_>,
        row: WindowRow,
        output: &mut BlockBuilder,
    ) -> Result<(), WindowError>;
}

/// A function bound to the frame it evaluates over.
pub struct FramedWindowFunction {
    function: Box<dyn WindowFunction>,
    frame: FrameInfo,
}

impl FramedWindowFunction {
    pub fn new(function: Box<dyn WindowFunction>, frame: FrameInfo) -> Self {
        Self { function, frame }
    }

    pub fn frame(&self) -> &FrameInfo {
        &self.frame
    }

    pub fn function_mut(&mut self) -> &mut dyn WindowFunction {
        self.function.as_mut()
    }

    pub fn output_type(&self) -> Type {
        self.function.output_type()
    }
}

impl std::fmt::Debug for FramedWindowFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedWindowFunction")
            .field("output_type", &self.function.output_type())
            .field("frame", &self.frame)
            .finish()
    }
}

pub struct RowNumberFunction;

impl WindowFunction for RowNumberFunction {
    fn output_type(&self) -> Type {
        Type::BigInt
    }

    fn process_row(
        &mut self,
        _partition: &WindowIndex<'_>,
        row: WindowRow,
        output: &mut BlockBuilder,
    ) -> Result<(), WindowError> {
        output.write_long(row.position as i64 + 1)?;
        Ok(output.close_entry()?)
    }
}

pub struct RankFunction;

impl WindowFunction for RankFunction {
    fn output_type(&self) -> Type {
        Type::BigInt
    }

    fn process_row(
        &mut self,
        _partition: &WindowIndex<'_>,
        row: WindowRow,
        output: &mut BlockBuilder,
    ) -> Result<(), WindowError> {
        output.write_long(row.peer_group_start as i64 + 1)?;
        Ok(output.close_entry()?)
    }
}

/// `count(*)` over the frame.
pub struct CountRowsFunction;

impl WindowFunction for CountRowsFunction {
    fn output_type(&self) -> Type {
        Type::BigInt
    }

    fn process_row(
        &mut self,
        _partition: &WindowIndex<'_>,
        row: WindowRow,
        output: &mut BlockBuilder,
    ) -> Result<(), WindowError> {
        output.write_long(row.frame_positions().count() as i64)?;
        Ok(output.close_entry()?)
    }
}

/// Sum of a bigint column over the frame; null for an empty frame or when
/// every value is null.
pub struct SumBigIntFunction {
    channel: usize,
}

impl SumBigIntFunction {
    pub fn new(channel: usize) -> Self {
        Self { channel }
    }
}

impl WindowFunction for SumBigIntFunction {
    fn output_type(&self) -> Type {
        Type::BigInt
    }

    fn process_row(
        &mut self,
        partition: &WindowIndex<'_>,
        row: WindowRow,
        output: &mut BlockBuilder,
    ) -> Result<(), WindowError> {
        let mut sum: Option<i64> = None;
        for position in row.frame_positions() {
            if partition.is_null(self.channel, position)? {
                continue;
            }
            let value = partition.get_long(self.channel, position)?;
            sum = Some(sum.unwrap_or(0).wrapping_add(value));
        }
        match sum {
            Some(sum) => {
                output.write_long(sum)?;
                Ok(output.close_entry()?)
            }
            None => Ok(output.append_null()?),
        }
    }
}

/// Value at the first or last row of the frame.
pub struct FrameValueFunction {
    channel: usize,
    ty: Type,
    last: bool,
}

impl FrameValueFunction {
    pub fn first_value(channel: usize, ty: Type) -> Self {
        Self {
            channel,
            ty,
            last: false,
        }
    }

    pub fn last_value(channel: usize, ty: Type) -> Self {
        Self {
            channel,
            ty,
            last: true,
        }
    }
}

impl WindowFunction for FrameValueFunction {
    fn output_type(&self) -> Type {
        self.ty
    }

    fn process_row(
        &mut self,
        partition: &WindowIndex<'_>,
        row: WindowRow,
        output: &mut BlockBuilder,
    ) -> Result<(), WindowError> {
        if row.is_empty_frame() {
            return Ok(output.append_null()?);
        }
        let position = if self.last {
            row.frame_end
        } else {
            row.frame_start
        };
        Ok(partition.append_to(self.channel, position as usize, output)?)
    }
}

/// Plan-level description of a window function, instantiated once per
/// operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowFunctionKind {
    RowNumber,
    Rank,
    CountRows,
    SumBigInt { channel: usize },
    FirstValue { channel: usize },
    LastValue { channel: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFunctionDefinition {
    pub kind: WindowFunctionKind,
    pub frame: FrameInfo,
}

impl WindowFunctionDefinition {
    pub fn new(kind: WindowFunctionKind, frame: FrameInfo) -> Self {
        Self { kind, frame }
    }

    pub fn create(&self, input_types: &[Type]) -> Result<FramedWindowFunction, WindowError> {
        let column_type = |channel: usize| {
            input_types.get(channel).copied().ok_or_else(|| {
                WindowError::InvalidArgument(format!("channel {channel} is out of range"))
            })
        };
        let function: Box<dyn WindowFunction> = match self.kind {
            WindowFunctionKind::RowNumber => Box::new(RowNumberFunction),
            WindowFunctionKind::Rank => Box::new(RankFunction),
            WindowFunctionKind::CountRows => Box::new(CountRowsFunction),
            WindowFunctionKind::SumBigInt { channel } => {
                if column_type(channel)? != Type::BigInt {
                    return Err(WindowError::InvalidArgument(format!(
                        "sum expects a bigint column at channel {channel}"
                    )));
                }
                Box::new(SumBigIntFunction::new(channel))
            }
            WindowFunctionKind::FirstValue { channel } => {
                Box::new(FrameValueFunction::first_value(channel, column_type(channel)?))
            }
            WindowFunctionKind::LastValue { channel } => {
                Box::new(FrameValueFunction::last_value(channel, column_type(channel)?))
            }
        };
        Ok(FramedWindowFunction::new(function, self.frame))
    }
}
