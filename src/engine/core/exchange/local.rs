use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use super::transport::{ExchangeTransport, PagesResponse};
use crate::engine::core::serde::{SerializedPage, write_serialized_page};
use crate::engine::errors::ExchangeError;

#[derive(Debug, Default)]
struct OutputBuffer {
    /// Token of the first frame still held.
    base_token: u64,
    frames: VecDeque<Bytes>,
    producers: usize,
    no_more_producers: bool,
    aborted: bool,
    notify: Arc<Notify>,
}

impl OutputBuffer {
    fn is_complete(&self) -> bool {
        self.aborted || (self.no_more_producers && self.producers == 0)
    }

    fn acknowledge(&mut self, token: u64) {
        while self.base_token < token && self.frames.pop_front().is_some() {
            self.base_token += 1;
        }
    }

    fn buffered_bytes(&self) -> u64 {
        self.frames.iter().map(|frame| frame.len() as u64).sum()
    }
}

/// In-process transport: producers publish framed pages per location and
/// consumers fetch them with `get_pages`.
#[derive(Debug, Default)]
pub struct LocalExchangeTransport {
    buffers: Mutex<HashMap<String, OutputBuffer>>,
}

impl LocalExchangeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_producer(&self, location: &str) {
        let mut buffers = self.buffers.lock();
        buffers.entry(location.to_string()).or_default().producers += 1;
    }

    /// Once set, the location completes after its last producer finishes.
    pub fn no_more_producers(&self, location: &str) {
        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(location.to_string()).or_default();
        buffer.no_more_producers = true;
        buffer.notify.notify_waiters();
    }

    pub fn publish(&self, location: &str, page: &SerializedPage) -> Result<(), ExchangeError> {
        let mut frame = Vec::with_capacity(page.slice().len() + 16);
        write_serialized_page(&mut frame, page).map_err(|e| ExchangeError::Transport {
            location: location.to_string(),
            message: e.to_string(),
        })?;

        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(location.to_string()).or_default();
        if buffer.aborted {
            return Ok(());
        }
        buffer.frames.push_back(Bytes::from(frame));
        buffer.notify.notify_waiters();
        Ok(())
    }

    pub fn finish_producer(&self, location: &str) {
        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(location.to_string()).or_default();
        buffer.producers = buffer.producers.saturating_sub(1);
        buffer.notify.notify_waiters();
    }

    /// Drops everything buffered for `location` and completes it.
    pub fn abort_location(&self, location: &str) {
        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(location.to_string()).or_default();
        buffer.aborted = true;
        buffer.frames.clear();
        buffer.notify.notify_waiters();
        debug!(target: "snapflow::exchange", location, "Aborted output buffer");
    }

    pub fn buffered_bytes(&self, location: &str) -> u64 {
        self.buffers
            .lock()
            .get(location)
            .map_or(0, OutputBuffer::buffered_bytes)
    }

    /// Acknowledges up to `token` and takes what is ready. `Err` hands back the
    /// notifier to wait on when nothing is ready yet.
    fn poll(
        &self,
        location: &str,
        token: u64,
        max_bytes: u64,
    ) -> Result<PagesResponse, Arc<Notify>> {
        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(location.to_string()).or_default();
        buffer.acknowledge(token);

        let mut bytes = Vec::new();
        let mut count = 0u64;
        for frame in &buffer.frames {
            if count > 0 && (bytes.len() + frame.len()) as u64 > max_bytes {
                break;
            }
            bytes.extend_from_slice(frame);
            count += 1;
        }
        let next_token = buffer.base_token + count;
        let complete =
            buffer.is_complete() && next_token == buffer.base_token + buffer.frames.len() as u64;
        if count == 0 && !complete {
            return Err(Arc::clone(&buffer.notify));
        }
        Ok(PagesResponse {
            bytes: Bytes::from(bytes),
            next_token,
            complete,
        })
    }
}

#[async_trait]
impl ExchangeTransport for LocalExchangeTransport {
    async fn get_pages(
        &self,
        location: &str,
        token: u64,
        max_bytes: u64,
    ) -> Result<PagesResponse, ExchangeError> {
        loop {
            let notify = match self.poll(location, token, max_bytes) {
                Ok(response) => return Ok(response),
                Err(notify) => notify,
            };
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            // Re-check after registering so a publish in between is not missed.
            match self.poll(location, token, max_bytes) {
                Ok(response) => return Ok(response),
                Err(_) => notified.await,
            }
        }
    }

    async fn abort(&self, location: &str) -> Result<(), ExchangeError> {
        self.abort_location(location);
        Ok(())
    }
}
