pub mod builder;
pub mod group_by_hash;
pub mod processor;


pub use builder::{GroupedTopNBuilder, TopNResult};
pub use group_by_hash::GroupByHash;
pub use processor::{TopNProcessor, TopNSpec};
