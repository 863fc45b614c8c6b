pub mod context;

#[cfg(test)]
mod context_test;

pub use context::{AggregatedMemoryContext, LocalMemoryContext};
