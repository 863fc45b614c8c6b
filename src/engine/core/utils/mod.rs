pub mod heap;

#[cfg(test)]
mod heap_test;

pub use heap::ComparatorHeap;
