use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::transport::ExchangeTransport;
use crate::engine::core::memory::LocalMemoryContext;
use crate::engine::core::operator::{Blocked, NOT_BLOCKED, SettableBlocked};
use crate::engine::core::page::MarkerPage;
use crate::engine::core::serde::SerializedPage;
use crate::engine::errors::ExchangeError;
use crate::shared::config::ExchangeConfig;

#[derive(Debug)]
enum Entry {
    Data(SerializedPage),
    /// One logical marker; `pending` holds the targets still owed a copy.
    Marker {
        page: SerializedPage,
        pending: HashSet<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocationStatus {
    Running,
    Complete,
    Failed,
}

/// Snapshot markers seen so far for one snapshot id.
#[derive(Debug)]
struct Alignment {
    page: SerializedPage,
    task_count: usize,
    received_from: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct ClientState {
    locations: HashMap<String, LocationStatus>,
    location_order: Vec<String>,
    no_more_locations: bool,
    targets: Vec<String>,
    closed_targets: HashSet<String>,
    no_more_targets: bool,
    entries: VecDeque<Entry>,
    /// Pages that arrived from a location after its marker, held until the
    /// marker is aligned across every producer.
    held: HashMap<String, VecDeque<SerializedPage>>,
    aligning: HashMap<(u64, bool), Alignment>,
    /// Markers already forwarded; later copies of them are absorbed.
    aligned: HashSet<(u64, bool)>,
    buffered_bytes: u64,
    failure: Option<(String, String)>,
    waiters: Vec<SettableBlocked>,
    closed: bool,
}

impl ClientState {
    fn is_held(&self, location: &str) -> bool {
        self.held.contains_key(location)
    }

    fn notify_waiters(&mut self) {
        for mut waiter in self.waiters.drain(..) {
            waiter.set();
        }
    }

    fn live_targets(&self) -> HashSet<String> {
        self.targets
            .iter()
            .filter(|target| !self.closed_targets.contains(*target))
            .cloned()
            .collect()
    }

    fn enqueue(&mut self, location: &str, page: SerializedPage) -> Result<(), ExchangeError> {
        if self.is_held(location) {
            self.buffered_bytes += page.size_in_bytes();
            if let Some(held) = self.held.get_mut(location) {
                held.push_back(page);
            }
            return Ok(());
        }
        if !page.is_marker_page() {
            self.buffered_bytes += page.size_in_bytes();
            self.entries.push_back(Entry::Data(page));
            return Ok(());
        }

        let marker = MarkerPage::deserialize(page.slice())?;
        let key = (marker.snapshot_id(), marker.is_resuming());
        if self.aligned.contains(&key) {
            debug!(
                target: "snapflow::exchange",
                location,
                snapshot_id = marker.snapshot_id(),
                "Absorbed marker already forwarded"
            );
            return Ok(());
        }
        let alignment = self.aligning.entry(key).or_insert_with(|| Alignment {
            page,
            task_count: marker.task_count() as usize,
            received_from: BTreeSet::new(),
        });
        alignment.received_from.insert(location.to_string());
        debug!(
            target: "snapflow::exchange",
            location,
            snapshot_id = marker.snapshot_id(),
            received = alignment.received_from.len(),
            task_count = alignment.task_count,
            "Received marker"
        );
        self.held.insert(location.to_string(), VecDeque::new());
        self.complete_alignments()
    }

    /// An alignment completes once `task_count` producers sent the marker,
    /// or, when the count is unknown (0) or unreachable, once no more
    /// locations can be added and every running location sent it.
    fn is_aligned(&self, alignment: &Alignment) -> bool {
        if alignment.task_count > 0 && alignment.received_from.len() >= alignment.task_count {
            return true;
        }
        self.no_more_locations
            && self.locations.iter().all(|(location, status)| {
                *status != LocationStatus::Running || alignment.received_from.contains(location)
            })
    }

    fn complete_alignments(&mut self) -> Result<(), ExchangeError> {
        loop {
            let ready = self
                .aligning
                .iter()
                .find(|(_, alignment)| self.is_aligned(alignment))
                .map(|(key, _)| *key);
            let Some(key) = ready else {
                return Ok(());
            };
            let Some(alignment) = self.aligning.remove(&key) else {
                return Ok(());
            };
            self.aligned.insert(key);
            self.entries.push_back(Entry::Marker {
                page: alignment.page,
                pending: self.live_targets(),
            });
            // Release the producers; their held pages may carry the next marker.
            for released in alignment.received_from {
                self.release(&released)?;
            }
        }
    }

    fn release(&mut self, location: &str) -> Result<(), ExchangeError> {
        if let Some(held) = self.held.remove(location) {
            for page in held {
                self.buffered_bytes = self.buffered_bytes.saturating_sub(page.size_in_bytes());
                self.enqueue(location, page)?;
            }
        }
        Ok(())
    }

    /// Next entry visible to `target`: the first data page, or the first
    /// marker it has not received yet, whichever comes first.
    fn poll(&mut self, target: &str) -> Option<SerializedPage> {
        let mut index = 0;
        while index < self.entries.len() {
            match &mut self.entries[index] {
                Entry::Data(_) => {
                    let Some(Entry::Data(page)) = self.entries.remove(index) else {
                        return None;
                    };
                    self.buffered_bytes = self.buffered_bytes.saturating_sub(page.size_in_bytes());
                    return Some(page);
                }
                Entry::Marker { page, pending } => {
                    if pending.remove(target) {
                        let page = page.clone();
                        if pending.is_empty() {
                            self.entries.remove(index);
                        }
                        return Some(page);
                    }
                    index += 1;
                }
            }
        }
        None
    }

    fn has_entry_for(&self, target: &str) -> bool {
        self.entries.iter().any(|entry| match entry {
            Entry::Data(_) => true,
            Entry::Marker { pending, .. } => pending.contains(target),
        })
    }

    fn all_locations_done(&self) -> bool {
        self.no_more_locations
            && self
                .locations
                .values()
                .all(|status| *status == LocationStatus::Complete)
    }

    /// Buffered bytes a target can actually poll. Held pages are excluded so
    /// they never stall the fetch that delivers the missing marker.
    fn deliverable_bytes(&self) -> u64 {
        let held: u64 = self
            .held
            .values()
            .flatten()
            .map(SerializedPage::size_in_bytes)
            .sum();
        self.buffered_bytes.saturating_sub(held)
    }

    fn is_finished(&self) -> bool {
        self.closed
            || (self.all_locations_done()
                && self.held.is_empty()
                && self.entries.is_empty())
    }
}

struct ClientInner {
    transport: Arc<dyn ExchangeTransport>,
    config: ExchangeConfig,
    state: Mutex<ClientState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    memory: LocalMemoryContext,
    space_available: Notify,
    runtime: Handle,
}

impl ClientInner {
    fn update_memory(&self, state: &mut ClientState) {
        if let Err(e) = self.memory.set_bytes(state.buffered_bytes) {
            warn!(target: "snapflow::exchange", error = %e, "Exchange buffer exceeds memory limit");
            if state.failure.is_none() {
                state.failure = Some(("memory".to_string(), e.to_string()));
            }
        }
    }

    fn add_pages(&self, location: &str, pages: Vec<SerializedPage>) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        for page in pages {
            if let Err(e) = state.enqueue(location, page) {
                state.failure = Some((location.to_string(), e.to_string()));
                break;
            }
        }
        self.update_memory(&mut state);
        state.notify_waiters();
    }

    fn location_complete(&self, location: &str) {
        let mut state = self.state.lock();
        state
            .locations
            .insert(location.to_string(), LocationStatus::Complete);
        debug!(target: "snapflow::exchange", location, "Location complete");
        if let Err(e) = state.complete_alignments() {
            state.failure.get_or_insert((location.to_string(), e.to_string()));
        }
        self.update_memory(&mut state);
        state.notify_waiters();
    }

    fn location_failed(&self, location: &str, error: ExchangeError) {
        warn!(target: "snapflow::exchange", location, error = %error, "Location failed");
        let mut state = self.state.lock();
        state
            .locations
            .insert(location.to_string(), LocationStatus::Failed);
        if state.failure.is_none() {
            state.failure = Some((location.to_string(), error.to_string()));
        }
        // The attempt is lost; what this location held is never delivered.
        if let Some(held) = state.held.remove(location) {
            let bytes: u64 = held.iter().map(SerializedPage::size_in_bytes).sum();
            state.buffered_bytes = state.buffered_bytes.saturating_sub(bytes);
        }
        if let Err(e) = state.complete_alignments() {
            debug!(target: "snapflow::exchange", error = %e, "Alignment after failure");
        }
        self.update_memory(&mut state);
        state.notify_waiters();
    }

    fn has_space(&self) -> bool {
        let state = self.state.lock();
        state.closed || state.deliverable_bytes() < self.config.max_buffered_bytes
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    async fn wait_for_space(&self) {
        loop {
            let notified = self.space_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.has_space() {
                return;
            }
            notified.await;
        }
    }
}

/// Fetches one location sequentially until it completes or fails. Failures
/// are reported to the client, never retried here.
struct PageBufferClient {
    inner: Arc<ClientInner>,
    location: String,
    token: u64,
}

impl PageBufferClient {
    async fn run(mut self) {
        loop {
            self.inner.wait_for_space().await;
            if self.inner.is_closed() {
                return;
            }
            let response = self
                .inner
                .transport
                .get_pages(&self.location, self.token, self.inner.config.max_response_bytes)
                .await;
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    self.inner.location_failed(&self.location, e);
                    return;
                }
            };
            let pages = match response.pages() {
                Ok(pages) => pages,
                Err(e) => {
                    self.inner.location_failed(&self.location, e.into());
                    return;
                }
            };
            self.token = response.next_token;
            self.inner.add_pages(&self.location, pages);
            if response.complete {
                self.inner.location_complete(&self.location);
                return;
            }
        }
    }
}

/// Gathers pages from every producer location of a stage and hands them to
/// the exchange operators (targets) of this task.
#[derive(Clone)]
pub struct ExchangeClient {
    inner: Arc<ClientInner>,
}

impl ExchangeClient {
    pub fn new(
        transport: Arc<dyn ExchangeTransport>,
        config: ExchangeConfig,
        memory: LocalMemoryContext,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                state: Mutex::new(ClientState::default()),
                tasks: Mutex::new(Vec::new()),
                memory,
                space_available: Notify::new(),
                runtime,
            }),
        }
    }

    /// Starts fetching from `location`. Returns false if it was already known.
    pub fn add_location(&self, location: impl Into<String>) -> Result<bool, ExchangeError> {
        let location = location.into();
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(ExchangeError::Closed);
            }
            if state.locations.contains_key(&location) {
                return Ok(false);
            }
            if state.no_more_locations {
                return Err(ExchangeError::Transport {
                    location,
                    message: "no more locations may be added".into(),
                });
            }
            state
                .locations
                .insert(location.clone(), LocationStatus::Running);
            state.location_order.push(location.clone());
        }

        let client = PageBufferClient {
            inner: Arc::clone(&self.inner),
            location: location.clone(),
            token: 0,
        };
        let task = self.inner.runtime.spawn(client.run());
        self.inner.tasks.lock().push(task);
        debug!(target: "snapflow::exchange", location = %location, "Added location");
        Ok(true)
    }

    pub fn no_more_locations(&self) {
        let mut state = self.inner.state.lock();
        state.no_more_locations = true;
        if let Err(e) = state.complete_alignments() {
            state.failure.get_or_insert(("markers".to_string(), e.to_string()));
        }
        self.inner.update_memory(&mut state);
        state.notify_waiters();
    }

    pub fn add_target(&self, target: impl Into<String>) -> Result<(), ExchangeError> {
        let target = target.into();
        let mut state = self.inner.state.lock();
        if state.no_more_targets {
            return Err(ExchangeError::NoMoreTargets);
        }
        if state.targets.contains(&target) {
            return Ok(());
        }
        // Markers already queued are owed to the new target too.
        for entry in state.entries.iter_mut() {
            if let Entry::Marker { pending, .. } = entry {
                pending.insert(target.clone());
            }
        }
        state.targets.push(target);
        Ok(())
    }

    pub fn no_more_targets(&self) {
        self.inner.state.lock().no_more_targets = true;
    }

    /// Next page for `target`. Markers are delivered once to every target;
    /// data pages go to whichever target polls first.
    pub fn poll_page(&self, target: &str) -> Result<Option<SerializedPage>, ExchangeError> {
        let mut state = self.inner.state.lock();
        if let Some((location, message)) = &state.failure {
            return Err(ExchangeError::Transport {
                location: location.clone(),
                message: message.clone(),
            });
        }
        if state.closed {
            return Ok(None);
        }
        if !state.targets.iter().any(|t| t == target) {
            return Err(ExchangeError::UnknownTarget(target.to_string()));
        }
        let page = state.poll(target);
        if page.is_some() {
            self.inner.update_memory(&mut state);
            if state.deliverable_bytes() < self.inner.config.max_buffered_bytes {
                self.inner.space_available.notify_waiters();
            }
        }
        Ok(page)
    }

    /// Blocked until a page or a state change is available for any target.
    pub fn is_blocked(&self) -> Blocked {
        let mut state = self.inner.state.lock();
        if state.failure.is_some() || state.is_finished() || !state.entries.is_empty() {
            return NOT_BLOCKED;
        }
        Self::wait(&mut state)
    }

    /// Blocked until something is available for `target`.
    pub fn is_blocked_for(&self, target: &str) -> Blocked {
        let mut state = self.inner.state.lock();
        if state.failure.is_some() || state.is_finished() || state.has_entry_for(target) {
            return NOT_BLOCKED;
        }
        Self::wait(&mut state)
    }

    fn wait(state: &mut ClientState) -> Blocked {
        let waiter = SettableBlocked::new();
        let blocked = waiter.blocked();
        state.waiters.push(waiter);
        blocked
    }

    pub fn is_finished(&self) -> bool {
        self.inner.state.lock().is_finished()
    }

    pub fn buffered_bytes(&self) -> u64 {
        self.inner.state.lock().buffered_bytes
    }

    /// Every location added so far, in insertion order.
    pub fn get_all_clients(&self) -> Vec<String> {
        self.inner.state.lock().location_order.clone()
    }

    /// Drops `target`; once every target is gone after `no_more_targets`, the
    /// client closes itself.
    pub fn close_target(&self, target: &str) {
        let close_client = {
            let mut state = self.inner.state.lock();
            state.closed_targets.insert(target.to_string());
            let mut index = 0;
            while index < state.entries.len() {
                let drained = match &mut state.entries[index] {
                    Entry::Marker { pending, .. } => {
                        pending.remove(target);
                        pending.is_empty()
                    }
                    Entry::Data(_) => false,
                };
                if drained {
                    state.entries.remove(index);
                } else {
                    index += 1;
                }
            }
            state.no_more_targets && state.closed_targets.len() >= state.targets.len()
        };
        if close_client {
            self.close();
        }
    }

    /// Stops every fetch, aborts unfinished locations and releases buffers.
    pub fn close(&self) {
        let unfinished = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.entries.clear();
            state.held.clear();
            state.aligning.clear();
            state.aligned.clear();
            state.buffered_bytes = 0;
            state.notify_waiters();
            state
                .locations
                .iter()
                .filter(|(_, status)| **status == LocationStatus::Running)
                .map(|(location, _)| location.clone())
                .collect::<Vec<_>>()
        };
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        self.inner.space_available.notify_waiters();
        self.inner.memory.close();

        if !unfinished.is_empty() {
            let transport = Arc::clone(&self.inner.transport);
            self.inner.runtime.spawn(async move {
                for location in unfinished {
                    if let Err(e) = transport.abort(&location).await {
                        warn!(target: "snapflow::exchange", location = %location, error = %e, "Abort failed");
                    }
                }
            });
        }
        info!(target: "snapflow::exchange", "Exchange client closed");
    }
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ExchangeClient")
            .field("locations", &state.location_order)
            .field("targets", &state.targets)
            .field("buffered_bytes", &state.buffered_bytes)
            .field("closed", &state.closed)
            .finish()
    }
}
