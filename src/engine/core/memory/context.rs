use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::engine::errors::MemoryError;

struct Node {
    name: String,
    parent: Option<Arc<Node>>,
    reserved: AtomicU64,
    limit: Option<u64>,
}

impl Node {
    /// Adds `delta` to this node only, failing if it would pass the limit.
    fn try_add(&self, delta: u64) -> Result<(), MemoryError> {
        let mut current = self.reserved.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(delta);
            if let Some(limit) = self.limit {
                if next > limit {
                    return Err(MemoryError::ExceededLimit {
                        context: self.name.clone(),
                        limit,
                        reserved: current,
                        requested: delta,
                    });
                }
            }
            match self.reserved.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, delta: u64) {
        let _ = self
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_sub(delta))
            });
    }
}

/// A node in the memory accounting tree. Cloning shares the node.
#[derive(Clone)]
pub struct AggregatedMemoryContext {
    node: Arc<Node>,
}

impl AggregatedMemoryContext {
    pub fn new_root(name: impl Into<String>, limit: Option<u64>) -> Self {
        Self {
            node: Arc::new(Node {
                name: name.into(),
                parent: None,
                reserved: AtomicU64::new(0),
                limit,
            }),
        }
    }

    /// Unbounded root, handy where accounting matters but limits do not.
    pub fn new_simple() -> Self {
        Self::new_root("root", None)
    }

    pub fn new_child(&self, name: impl Into<String>) -> Self {
        self.new_child_with_limit(name, None)
    }

    pub fn new_child_with_limit(&self, name: impl Into<String>, limit: Option<u64>) -> Self {
        Self {
            node: Arc::new(Node {
                name: name.into(),
                parent: Some(Arc::clone(&self.node)),
                reserved: AtomicU64::new(0),
                limit,
            }),
        }
    }

    pub fn new_local(&self, name: impl Into<String>) -> LocalMemoryContext {
        LocalMemoryContext {
            owner: self.clone(),
            name: name.into(),
            bytes: Mutex::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn bytes(&self) -> u64 {
        self.node.reserved.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<u64> {
        self.node.limit
    }

    /// Reserves on this node and every ancestor; on failure nothing stays reserved.
    fn reserve(&self, delta: u64) -> Result<(), MemoryError> {
        let mut applied: Vec<&Node> = Vec::new();
        let mut cursor = Some(self.node.as_ref());
        while let Some(node) = cursor {
            if let Err(err) = node.try_add(delta) {
                for done in applied {
                    done.release(delta);
                }
                return Err(err);
            }
            applied.push(node);
            cursor = node.parent.as_deref();
        }
        Ok(())
    }

    fn release(&self, delta: u64) {
        let mut cursor = Some(self.node.as_ref());
        while let Some(node) = cursor {
            node.release(delta);
            cursor = node.parent.as_deref();
        }
    }
}

impl fmt::Debug for AggregatedMemoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatedMemoryContext")
            .field("name", &self.node.name)
            .field("bytes", &self.bytes())
            .field("limit", &self.node.limit)
            .finish()
    }
}

/// Leaf reservation owned by one component. Dropping it releases the bytes.
pub struct LocalMemoryContext {
    owner: AggregatedMemoryContext,
    name: String,
    bytes: Mutex<u64>,
}

impl LocalMemoryContext {
    pub fn bytes(&self) -> u64 {
        *self.bytes.lock()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the reservation to `bytes`, propagating the difference upward.
    /// If any ancestor limit would be exceeded the old reservation stays.
    pub fn set_bytes(&self, bytes: u64) -> Result<(), MemoryError> {
        let mut current = self.bytes.lock();
        if bytes > *current {
            let delta = bytes - *current;
            if let Err(err) = self.owner.reserve(delta) {
                debug!(
                    target: "snapflow::memory",
                    context = %self.name,
                    requested = bytes,
                    held = *current,
                    "Memory reservation rejected"
                );
                return Err(err);
            }
        } else if bytes < *current {
            self.owner.release(*current - bytes);
        }
        *current = bytes;
        Ok(())
    }

    pub fn try_set_bytes(&self, bytes: u64) -> bool {
        self.set_bytes(bytes).is_ok()
    }

    pub fn close(&self) {
        let mut current = self.bytes.lock();
        self.owner.release(*current);
        *current = 0;
    }
}

impl Drop for LocalMemoryContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for LocalMemoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMemoryContext")
            .field("name", &self.name)
            .field("bytes", &self.bytes())
            .finish()
    }
}
