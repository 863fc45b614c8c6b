use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::stats::SpillerStats;
use crate::engine::core::memory::LocalMemoryContext;
use crate::engine::core::operator::{Blocked, NOT_BLOCKED};
use crate::engine::core::page::Page;
use crate::engine::core::serde::{
    PageCodecMarker, PagesSerde, SerializedPageReader, read_serialized_pages,
    write_serialized_page,
};
use crate::engine::errors::SpillError;
use crate::shared::storage_header::{FileKind, MagicFile};

/// Fixed reservation for the write buffer of one spill stream.
pub const SPILL_BUFFER_BYTES: u64 = 4096;

pub struct SpillFileHeader;

impl MagicFile for SpillFileHeader {
    const MAGIC: [u8; 8] = FileKind::SpillFile.magic();
}

type SpillOutcome = Result<(), Arc<SpillError>>;

/// Completion of one `spill` call. Clones share the same outcome.
#[derive(Clone)]
pub struct SpillFuture {
    future: Shared<BoxFuture<'static, SpillOutcome>>,
    done: Arc<AtomicBool>,
}

impl SpillFuture {
    fn pending() -> (Self, oneshot::Sender<SpillOutcome>, Arc<AtomicBool>) {
        let (sender, receiver) = oneshot::channel::<SpillOutcome>();
        let done = Arc::new(AtomicBool::new(false));
        let future = receiver
            .map(|received| {
                received.unwrap_or_else(|_| {
                    Err(Arc::new(SpillError::Task("spill task dropped".into())))
                })
            })
            .boxed()
            .shared();
        (
            Self {
                future,
                done: Arc::clone(&done),
            },
            sender,
            done,
        )
    }

    pub fn failed(error: SpillError) -> Self {
        let outcome: SpillOutcome = Err(Arc::new(error));
        Self {
            future: futures::future::ready(outcome).boxed().shared(),
            done: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire) || self.future.peek().is_some()
    }

    /// Outcome of a finished spill, `None` while it is still running.
    pub fn result(&self) -> Option<Result<(), SpillError>> {
        if !self.is_done() {
            return None;
        }
        self.future
            .clone()
            .now_or_never()
            .map(|outcome| outcome.map_err(SpillError::Shared))
    }

    pub fn blocked(&self) -> Blocked {
        if self.is_done() {
            return NOT_BLOCKED;
        }
        Blocked::waiting(self.future.clone().map(|_| ()))
    }
}

impl Future for SpillFuture {
    type Output = Result<(), SpillError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.future)
            .poll(cx)
            .map(|outcome| outcome.map_err(SpillError::Shared))
    }
}

impl std::fmt::Debug for SpillFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpillFuture")
            .field("done", &self.is_done())
            .finish()
    }
}

/// One append-only stream of pages written to disk and read back once.
pub trait SingleStreamSpiller: Send {
    /// Starts writing `pages` in the background. Only one spill may run at a
    /// time; a second call before the first finishes fails with
    /// `SpillInProgress`.
    fn spill(&mut self, pages: Vec<Page>) -> SpillFuture;

    /// Pages written so far, in write order. Fails while a spill is running.
    fn get_spilled_pages(&mut self) -> Result<SpilledPages, SpillError>;

    fn spilled_bytes(&self) -> u64;

    /// Deletes the spill file and releases the buffer reservation.
    fn close(&mut self);
}

struct SpillFileState {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

struct SpillerInner {
    dir: PathBuf,
    serde: PagesSerde,
    stats: Arc<SpillerStats>,
    file: Mutex<SpillFileState>,
    spilled_bytes: AtomicU64,
    closed: AtomicBool,
}

impl SpillerInner {
    fn codec_flags(&self) -> u16 {
        let mut markers = PageCodecMarker::empty();
        if self.serde.is_compressing() {
            markers |= PageCodecMarker::COMPRESSED;
        }
        if self.serde.is_encrypting() {
            markers |= PageCodecMarker::ENCRYPTED;
        }
        u16::from(markers.bits())
    }

    fn open_writer(&self, state: &mut SpillFileState) -> Result<(), SpillError> {
        if state.writer.is_some() {
            return Ok(());
        }
        let path = match &state.path {
            Some(path) => path.clone(),
            None => {
                fs::create_dir_all(&self.dir)?;
                let (_, path) = tempfile::Builder::new()
                    .prefix(super::factory::SPILL_FILE_PREFIX)
                    .suffix(".bin")
                    .tempfile_in(&self.dir)?
                    .keep()
                    .map_err(|e| SpillError::Io(e.error))?;
                debug!(target: "snapflow::spill", path = %path.display(), "Created spill file");
                path
            }
        };
        let fresh = state.path.is_none();
        let file = OpenOptions::new().append(true).open(&path)?;
        let mut writer = BufWriter::with_capacity(SPILL_BUFFER_BYTES as usize, file);
        if fresh {
            SpillFileHeader::write_header(&mut writer, self.codec_flags())?;
        }
        state.path = Some(path);
        state.writer = Some(writer);
        Ok(())
    }

    fn write_pages(&self, pages: &[Page]) -> Result<(), SpillError> {
        let mut state = self.file.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(SpillError::Closed);
        }
        self.open_writer(&mut state)?;
        let Some(writer) = state.writer.as_mut() else {
            return Err(SpillError::Closed);
        };
        let mut written = 0u64;
        for page in pages {
            let serialized = self.serde.serialize(page)?;
            written += write_serialized_page(writer, &serialized)? as u64;
        }
        writer.flush()?;
        self.spilled_bytes.fetch_add(written, Ordering::Relaxed);
        self.stats.on_spill(pages.len() as u64, written);
        Ok(())
    }
}

/// File-backed spiller. The file is created by the first spill, appended to by
/// later ones, and deleted on close or drop.
pub struct FileSingleStreamSpiller {
    inner: Arc<SpillerInner>,
    runtime: Handle,
    memory: LocalMemoryContext,
    last_spill: Option<SpillFuture>,
    closed: bool,
}

impl FileSingleStreamSpiller {
    pub fn new(
        dir: impl Into<PathBuf>,
        serde: PagesSerde,
        memory: LocalMemoryContext,
        stats: Arc<SpillerStats>,
        runtime: Handle,
    ) -> Result<Self, SpillError> {
        memory.set_bytes(SPILL_BUFFER_BYTES)?;
        stats.on_spiller_created();
        Ok(Self {
            inner: Arc::new(SpillerInner {
                dir: dir.into(),
                serde,
                stats,
                file: Mutex::new(SpillFileState {
                    path: None,
                    writer: None,
                }),
                spilled_bytes: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
            runtime,
            memory,
            last_spill: None,
            closed: false,
        })
    }

    /// Location of the spill file once the first spill created it.
    pub fn path(&self) -> Option<PathBuf> {
        self.inner.file.lock().path.clone()
    }

    pub fn memory_bytes(&self) -> u64 {
        self.memory.bytes()
    }

    fn spill_in_progress(&self) -> bool {
        self.last_spill.as_ref().is_some_and(|spill| !spill.is_done())
    }
}

impl SingleStreamSpiller for FileSingleStreamSpiller {
    fn spill(&mut self, pages: Vec<Page>) -> SpillFuture {
        if self.closed {
            return SpillFuture::failed(SpillError::Closed);
        }
        if self.spill_in_progress() {
            return SpillFuture::failed(SpillError::SpillInProgress);
        }

        let (future, sender, done) = SpillFuture::pending();
        let inner = Arc::clone(&self.inner);
        self.runtime.spawn_blocking(move || {
            let outcome = inner.write_pages(&pages).map_err(|e| {
                inner.stats.on_failure();
                warn!(target: "snapflow::spill", error = %e, "Spill failed");
                Arc::new(e)
            });
            let _ = sender.send(outcome);
            done.store(true, Ordering::Release);
        });
        self.last_spill = Some(future.clone());
        future
    }

    fn get_spilled_pages(&mut self) -> Result<SpilledPages, SpillError> {
        if self.closed {
            return Err(SpillError::Closed);
        }
        if self.spill_in_progress() {
            return Err(SpillError::SpillInProgress);
        }
        if let Some(Err(err)) = self.last_spill.as_ref().and_then(SpillFuture::result) {
            return Err(err);
        }

        let mut state = self.inner.file.lock();
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
        }
        let Some(path) = state.path.clone() else {
            return Ok(SpilledPages::empty(self.inner.serde.clone()));
        };
        drop(state);
        SpilledPages::open(&path, self.inner.serde.clone())
    }

    fn spilled_bytes(&self) -> u64 {
        self.inner.spilled_bytes.load(Ordering::Relaxed)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.inner.file.lock();
        self.inner.closed.store(true, Ordering::Release);
        state.writer = None;
        if let Some(path) = state.path.take() {
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(target: "snapflow::spill", path = %path.display(), "Deleted spill file")
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(target: "snapflow::spill", path = %path.display(), error = %e, "Failed to delete spill file")
                }
            }
        }
        drop(state);
        self.memory.close();
    }
}

impl Drop for FileSingleStreamSpiller {
    fn drop(&mut self) {
        self.close();
    }
}

/// Forward-only reader over a spill file.
pub struct SpilledPages {
    pages: Option<SerializedPageReader<BufReader<File>>>,
    serde: PagesSerde,
}

impl SpilledPages {
    fn empty(serde: PagesSerde) -> Self {
        Self { pages: None, serde }
    }

    fn open(path: &Path, serde: PagesSerde) -> Result<Self, SpillError> {
        let mut reader = BufReader::new(File::open(path)?);
        SpillFileHeader::read_and_validate_header(&mut reader)?;
        Ok(Self {
            pages: Some(read_serialized_pages(reader)),
            serde,
        })
    }
}

impl Iterator for SpilledPages {
    type Item = Result<Page, SpillError>;

    fn next(&mut self) -> Option<Self::Item> {
        let serialized = match self.pages.as_mut()?.next()? {
            Ok(serialized) => serialized,
            Err(err) => {
                self.pages = None;
                return Some(Err(err.into()));
            }
        };
        Some(self.serde.deserialize(&serialized).map_err(SpillError::from))
    }
}
