pub mod factory;
pub mod spiller;
pub mod stats;


pub use factory::{SpillerFactory, cleanup_spill_paths};
pub use spiller::{
    FileSingleStreamSpiller, SPILL_BUFFER_BYTES, SingleStreamSpiller, SpillFileHeader,
    SpillFuture, SpilledPages,
};
pub use stats::SpillerStats;
