use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide spill counters shared by a factory and its spillers.
#[derive(Debug, Default)]
pub struct SpillerStats {
    spillers_created: AtomicU64,
    spilled_pages: AtomicU64,
    spilled_bytes: AtomicU64,
    failures: AtomicU64,
}

impl SpillerStats {
    pub fn on_spiller_created(&self) {
        self.spillers_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_spill(&self, pages: u64, bytes: u64) {
        self.spilled_pages.fetch_add(pages, Ordering::Relaxed);
        self.spilled_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn on_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn spillers_created(&self) -> u64 {
        self.spillers_created.load(Ordering::Relaxed)
    }

    pub fn total_spilled_pages(&self) -> u64 {
        self.spilled_pages.load(Ordering::Relaxed)
    }

    pub fn total_spilled_bytes(&self) -> u64 {
        self.spilled_bytes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
