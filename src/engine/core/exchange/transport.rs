use async_trait::async_trait;
use bytes::Bytes;

use crate::engine::core::serde::{SerializedPage, read_serialized_pages};
use crate::engine::errors::{ExchangeError, SerdeError};

/// One round trip of a location fetch. `bytes` holds framed serialized pages;
/// the next request passes `next_token`, which also acknowledges every page
/// before it.
#[derive(Debug, Clone, Default)]
pub struct PagesResponse {
    pub bytes: Bytes,
    pub next_token: u64,
    pub complete: bool,
}

impl PagesResponse {
    pub fn pages(&self) -> Result<Vec<SerializedPage>, SerdeError> {
        read_serialized_pages(self.bytes.as_ref()).collect()
    }
}

/// How an exchange client reaches the output buffers of its producers.
#[async_trait]
pub trait ExchangeTransport: Send + Sync {
    /// Pages starting at `token`, at most `max_bytes` unless a single page is
    /// larger. Waits until at least one page is available or the location is
    /// complete.
    async fn get_pages(
        &self,
        location: &str,
        token: u64,
        max_bytes: u64,
    ) -> Result<PagesResponse, ExchangeError>;

    /// The consumer gives up on `location`; its buffer may be released.
    async fn abort(&self, location: &str) -> Result<(), ExchangeError>;
}
