pub mod frame;
pub mod function;
pub mod partition;

#[cfg(test)]
mod partition_test;

pub use frame::{FrameBound, FrameInfo, FrameType};
pub use function::{
    FramedWindowFunction, WindowFunction, WindowFunctionDefinition, WindowFunctionKind,
    WindowIndex, WindowRow,
};
pub use partition::WindowPartition;
