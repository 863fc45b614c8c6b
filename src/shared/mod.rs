pub mod config;
pub mod storage_header;

#[cfg(test)]
pub mod storage_header_tests;
