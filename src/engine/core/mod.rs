pub mod block;
pub mod exchange;
pub mod memory;
pub mod operator;
pub mod page;
pub mod serde;
pub mod snapshot;
pub mod spill;
pub mod topn;
pub mod utils;
pub mod window;
