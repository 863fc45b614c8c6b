use serde::{Deserialize, Serialize};

use super::frame::{FrameBound, FrameInfo, FrameType};
use super::function::{FramedWindowFunction, WindowIndex, WindowRow};
use crate::engine::core::page::{PageBuilder, PagesIndex};
use crate::engine::errors::WindowError;

/// Cursor over one partition `[partition_start, partition_end)` of a sorted
/// `PagesIndex`. Holds no reference to the index so it can be captured and
/// restored by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPartition {
    partition_start: usize,
    partition_end: usize,
    peer_group_start: usize,
    peer_group_end: usize,
    current_position: usize,
}

impl WindowPartition {
    /// Positions the cursor on the first row and resets every function.
    pub fn new(
        index: &PagesIndex,
        partition_start: usize,
        partition_end: usize,
        peer_channels: &[usize],
        functions: &mut [FramedWindowFunction],
    ) -> Result<Self, WindowError> {
        let window = WindowIndex::new(index, partition_start, partition_end);
        for function in functions.iter_mut() {
            function.function_mut().reset(&window);
        }
        let mut partition = Self {
            partition_start,
            partition_end,
            peer_group_start: partition_start,
            peer_group_end: partition_start,
            current_position: partition_start,
        };
        partition.update_peer_group(index, peer_channels)?;
        Ok(partition)
    }

    pub fn partition_start(&self) -> usize {
        self.partition_start
    }

    pub fn partition_end(&self) -> usize {
        self.partition_end
    }

    pub fn current_position(&self) -> usize {
        self.current_position
    }

    pub fn has_next(&self) -> bool {
        self.current_position < self.partition_end
    }

    /// Writes the output channels of the current row followed by one value per
    /// function, then advances.
    pub fn process_next_row(
        &mut self,
        index: &PagesIndex,
        output_channels: &[usize],
        peer_channels: &[usize],
        functions: &mut [FramedWindowFunction],
        builder: &mut PageBuilder,
    ) -> Result<(), WindowError> {
        if !self.has_next() {
            return Err(WindowError::PartitionExhausted);
        }

        for (channel, input) in output_channels.iter().enumerate() {
            index.append_to(*input, self.current_position, builder.builder(channel)?)?;
        }

        if self.current_position == self.peer_group_end {
            self.update_peer_group(index, peer_channels)?;
        }

        let window = WindowIndex::new(index, self.partition_start, self.partition_end);
        for (offset, function) in functions.iter_mut().enumerate() {
            let (frame_start, frame_end) = self.frame_range(index, function.frame())?;
            let row = WindowRow {
                position: self.current_position - self.partition_start,
                peer_group_start: self.peer_group_start - self.partition_start,
                peer_group_end: self.peer_group_end - self.partition_start - 1,
                frame_start,
                frame_end,
            };
            let output = builder.builder(output_channels.len() + offset)?;
            function.function_mut().process_row(&window, row, output)?;
        }
        builder.declare_position();

        self.current_position += 1;
        Ok(())
    }

    fn update_peer_group(
        &mut self,
        index: &PagesIndex,
        peer_channels: &[usize],
    ) -> Result<(), WindowError> {
        self.peer_group_start = self.current_position;
        self.peer_group_end = if self.current_position < self.partition_end {
            index.find_group_end(peer_channels, self.current_position, self.partition_end)?
        } else {
            self.partition_end
        };
        Ok(())
    }

    /// Partition-local frame of the current row, `(-1, -1)` when empty.
    pub fn frame_range(
        &self,
        index: &PagesIndex,
        frame: &FrameInfo,
    ) -> Result<(i64, i64), WindowError> {
        let row = (self.current_position - self.partition_start) as i64;
        let last = (self.partition_end - self.partition_start) as i64 - 1;

        let start = match frame.start_type() {
            FrameBound::UnboundedPreceding => 0,
            FrameBound::Preceding => {
                row.saturating_sub(self.offset(index, frame.start_channel(), "starting")?)
            }
            FrameBound::Following => {
                row.saturating_add(self.offset(index, frame.start_channel(), "starting")?)
            }
            FrameBound::CurrentRow if frame.frame_type() == FrameType::Range => {
                (self.peer_group_start - self.partition_start) as i64
            }
            FrameBound::CurrentRow => row,
            FrameBound::UnboundedFollowing => last,
        };
        let end = match frame.end_type() {
            FrameBound::UnboundedFollowing => last,
            FrameBound::Preceding => {
                row.saturating_sub(self.offset(index, frame.end_channel(), "ending")?)
            }
            FrameBound::Following => {
                row.saturating_add(self.offset(index, frame.end_channel(), "ending")?)
            }
            FrameBound::CurrentRow if frame.frame_type() == FrameType::Range => {
                (self.peer_group_end - self.partition_start) as i64 - 1
            }
            FrameBound::CurrentRow => row,
            FrameBound::UnboundedPreceding => 0,
        };

        if start > end || start > last || end < 0 {
            return Ok((-1, -1));
        }
        Ok((start.max(0), end.min(last)))
    }

    fn offset(
        &self,
        index: &PagesIndex,
        channel: Option<usize>,
        bound: &'static str,
    ) -> Result<i64, WindowError> {
        let channel = channel.ok_or(WindowError::MissingOffsetChannel { bound })?;
        if index.is_null(channel, self.current_position)? {
            return Err(WindowError::NullFrameOffset(bound));
        }
        let value = index.get_long(channel, self.current_position)?;
        if value < 0 {
            return Err(WindowError::NegativeFrameOffset(value));
        }
        Ok(value)
    }
}
