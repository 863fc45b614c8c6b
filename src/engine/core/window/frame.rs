use serde::{Deserialize, Serialize};

use crate::engine::errors::WindowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameType {
    Rows,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding,
    CurrentRow,
    Following,
    UnboundedFollowing,
}

impl FrameBound {
    fn has_offset(&self) -> bool {
        matches!(self, FrameBound::Preceding | FrameBound::Following)
    }
}

/// A window frame. `Preceding` and `Following` bounds read their offset per
/// row from the given channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    frame_type: FrameType,
    start_type: FrameBound,
    start_channel: Option<usize>,
    end_type: FrameBound,
    end_channel: Option<usize>,
}

impl FrameInfo {
    pub fn new(
        frame_type: FrameType,
        start_type: FrameBound,
        start_channel: Option<usize>,
        end_type: FrameBound,
        end_channel: Option<usize>,
    ) -> Result<Self, WindowError> {
        if start_type == FrameBound::UnboundedFollowing {
            return Err(WindowError::InvalidFrame(
                "frame start cannot be UNBOUNDED FOLLOWING".into(),
            ));
        }
        if end_type == FrameBound::UnboundedPreceding {
            return Err(WindowError::InvalidFrame(
                "frame end cannot be UNBOUNDED PRECEDING".into(),
            ));
        }
        if frame_type == FrameType::Range && (start_type.has_offset() || end_type.has_offset()) {
            return Err(WindowError::RangeOffsetUnsupported);
        }
        if start_type.has_offset() && start_channel.is_none() {
            return Err(WindowError::MissingOffsetChannel { bound: "start" });
        }
        if end_type.has_offset() && end_channel.is_none() {
            return Err(WindowError::MissingOffsetChannel { bound: "end" });
        }
        Ok(Self {
            frame_type,
            start_type,
            start_channel: start_channel.filter(|_| start_type.has_offset()),
            end_type,
            end_channel: end_channel.filter(|_| end_type.has_offset()),
        })
    }

    /// `RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`, the SQL default.
    pub fn default_frame() -> Self {
        Self {
            frame_type: FrameType::Range,
            start_type: FrameBound::UnboundedPreceding,
            start_channel: None,
            end_type: FrameBound::CurrentRow,
            end_channel: None,
        }
    }

    pub fn rows(
        start_type: FrameBound,
        start_channel: Option<usize>,
        end_type: FrameBound,
        end_channel: Option<usize>,
    ) -> Result<Self, WindowError> {
        Self::new(FrameType::Rows, start_type, start_channel, end_type, end_channel)
    }

    pub fn range(start_type: FrameBound, end_type: FrameBound) -> Result<Self, WindowError> {
        Self::new(FrameType::Range, start_type, None, end_type, None)
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn start_type(&self) -> FrameBound {
        self.start_type
    }

    pub fn start_channel(&self) -> Option<usize> {
        self.start_channel
    }

    pub fn end_type(&self) -> FrameBound {
        self.end_type
    }

    pub fn end_channel(&self) -> Option<usize> {
        self.end_channel
    }
}
