use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tracing::{info, warn};

use super::spiller::FileSingleStreamSpiller;
use super::stats::SpillerStats;
use crate::engine::core::memory::LocalMemoryContext;
use crate::engine::core::serde::{PageCipher, PagesSerde};
use crate::engine::errors::SpillError;
use crate::shared::config::SpillConfig;

pub const SPILL_FILE_PREFIX: &str = "spill-";

/// Hands out spillers across the configured spill paths.
#[derive(Debug)]
pub struct SpillerFactory {
    paths: Vec<PathBuf>,
    max_used_space_threshold: f64,
    compression: bool,
    encryption: bool,
    runtime: Handle,
    next_path: AtomicUsize,
    stats: Arc<SpillerStats>,
}

impl SpillerFactory {
    pub fn new(config: &SpillConfig, runtime: Handle) -> Result<Self, SpillError> {
        if config.paths.is_empty() {
            return Err(SpillError::NoSpillPaths);
        }
        let paths: Vec<PathBuf> = config.paths.iter().map(PathBuf::from).collect();
        for path in &paths {
            fs::create_dir_all(path)?;
        }
        Ok(Self {
            paths,
            max_used_space_threshold: config.max_used_space_threshold,
            compression: config.compression,
            encryption: config.encryption,
            runtime,
            next_path: AtomicUsize::new(0),
            stats: Arc::new(SpillerStats::default()),
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn stats(&self) -> &Arc<SpillerStats> {
        &self.stats
    }

    /// New spiller on the next path with enough free space. Each spiller gets
    /// its own encryption key when encryption is on.
    pub fn create(&self, memory: LocalMemoryContext) -> Result<FileSingleStreamSpiller, SpillError> {
        let path = self.next_spill_path()?;
        let cipher = self.encryption.then(PageCipher::random);
        let serde = PagesSerde::with_options(self.compression, cipher);
        FileSingleStreamSpiller::new(
            path,
            serde,
            memory,
            Arc::clone(&self.stats),
            self.runtime.clone(),
        )
    }

    fn next_spill_path(&self) -> Result<PathBuf, SpillError> {
        for _ in 0..self.paths.len() {
            let index = self.next_path.fetch_add(1, Ordering::Relaxed) % self.paths.len();
            let path = &self.paths[index];
            if self.has_enough_disk_space(path) {
                return Ok(path.clone());
            }
        }
        warn!(target: "snapflow::spill", paths = ?self.paths, "No spill path has enough free space");
        Err(SpillError::NoSpillSpace)
    }

    fn has_enough_disk_space(&self, path: &Path) -> bool {
        let (available, total) = match (fs2::available_space(path), fs2::total_space(path)) {
            (Ok(available), Ok(total)) => (available, total),
            (Err(e), _) | (_, Err(e)) => {
                warn!(target: "snapflow::spill", path = %path.display(), error = %e, "Cannot read disk usage");
                return false;
            }
        };
        if total == 0 {
            return false;
        }
        let used = 1.0 - available as f64 / total as f64;
        used < self.max_used_space_threshold
    }

    pub fn cleanup_stale_files(&self) -> usize {
        cleanup_spill_paths(&self.paths)
    }
}

/// Deletes leftover `spill-*` files in every path. Returns how many were removed.
pub fn cleanup_spill_paths<P: AsRef<Path>>(paths: &[P]) -> usize {
    let mut removed = 0;
    for dir in paths {
        let dir = dir.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let stale = path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(SPILL_FILE_PREFIX));
            if !stale {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(target: "snapflow::spill", path = %path.display(), error = %e, "Failed to delete stale spill file")
                }
            }
        }
    }
    if removed > 0 {
        info!(target: "snapflow::spill", removed, "Deleted stale spill files");
    }
    removed
}
