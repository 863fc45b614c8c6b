pub mod restorable;
pub mod state;
pub mod state_file;
pub mod store;

#[cfg(test)]
mod restorable_test;
#[cfg(test)]
mod store_test;

pub use restorable::{Restorable, SingleInputRestorable, SingleInputSnapshotState, SnapshotHandle};
pub use state::{
    ExchangeState, LimitState, MemoryState, OperatorState, TopNState, ValuesState, WindowState,
};
pub use store::{SnapshotStatus, SnapshotStore};
