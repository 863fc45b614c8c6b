pub mod global;
pub mod model;


pub use global::CONFIG;
pub use model::{
    ExchangeConfig, ExecutionConfig, LoggingConfig, MemoryConfig, Settings, SnapshotConfig,
    SpillConfig, load_settings,
};
