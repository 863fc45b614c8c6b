use std::io;
use thiserror::Error;
use tracing::{debug, error};

/// Structural misuse of blocks and builders. These are contract violations and
/// abort the operator that raised them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("position {position} is not valid (position count {count})")]
    PositionOutOfBounds { position: usize, count: usize },

    #[error("invalid region: offset {offset}, length {length}, position count {count}")]
    InvalidRegion {
        offset: usize,
        length: usize,
        count: usize,
    },

    #[error("expected entry size to be exactly {expected} words but was {actual}")]
    EntrySize { expected: usize, actual: usize },

    #[error("current entry must be closed before a null can be written")]
    EntryNotClosed,

    #[error("{operation} is not supported by {encoding}")]
    Unsupported {
        operation: &'static str,
        encoding: &'static str,
    },

    #[error("offset must be 0 or 8, got {0}")]
    InvalidWordOffset(usize),

    #[error("backing storage too small: {0}")]
    InsufficientStorage(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("block {channel} has {got} positions, expected {expected}")]
    InconsistentPositionCount {
        channel: usize,
        expected: usize,
        got: usize,
    },

    #[error("channel {0} out of bounds")]
    ChannelOutOfBounds(usize),

    #[error("page must contain at least one position")]
    EmptyPage,

    #[error("marker page does not carry data")]
    MarkerPage,

    #[error(transparent)]
    Block(#[from] BlockError),
}

#[derive(Debug, Error)]
pub enum SerdeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected end of serialized data while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("unknown block encoding: {0}")]
    UnknownEncoding(String),

    #[error("corrupt serialized block: {0}")]
    Corrupt(&'static str),

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("serialized page is {flag} but no {component} is configured")]
    MissingCodec {
        flag: &'static str,
        component: &'static str,
    },

    #[error("invalid marker page: expected {expected} bytes, got {got}")]
    InvalidMarker { expected: usize, got: usize },

    #[error("zero-row pages cannot be serialized")]
    EmptyPage,

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Block(#[from] BlockError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error(
        "exceeded memory limit of {limit} bytes in context '{context}' (requested {requested}, reserved {reserved})"
    )]
    ExceededLimit {
        context: String,
        limit: u64,
        reserved: u64,
        requested: u64,
    },
}

#[derive(Debug, Error)]
pub enum SpillError {
    #[error("spill I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("spill serialization error: {0}")]
    Serde(#[from] SerdeError),

    #[error("no spill path with enough free space is available")]
    NoSpillSpace,

    #[error("no spill paths configured")]
    NoSpillPaths,

    #[error("spill already in progress")]
    SpillInProgress,

    #[error("spiller is closed")]
    Closed,

    #[error("spill task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Shared(std::sync::Arc<SpillError>),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("operator {0} is not restorable")]
    NotRestorable(String),

    #[error("snapshot {snapshot_id} was never captured for operator {operator_id}")]
    NotCaptured {
        snapshot_id: u64,
        operator_id: String,
    },

    #[error("snapshot state for {operator_id} has the wrong kind: expected {expected}")]
    StateMismatch {
        operator_id: String,
        expected: &'static str,
    },

    #[error("failed to restore operator state: {0}")]
    Restore(String),

    #[error("snapshot store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot state encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error(transparent)]
    Serde(#[from] SerdeError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("Window frame {0} offset must not be null")]
    NullFrameOffset(&'static str),

    #[error("Window frame offset must not be negative: {0}")]
    NegativeFrameOffset(i64),

    #[error("RANGE frames do not support explicit offsets")]
    RangeOffsetUnsupported,

    #[error("frame {bound} bound requires an offset channel")]
    MissingOffsetChannel { bound: &'static str },

    #[error("no more rows in partition")]
    PartitionExhausted,

    #[error("invalid window frame: {0}")]
    InvalidFrame(String),

    #[error("invalid window function argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Block(#[from] BlockError),
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("transport failure for {location}: {message}")]
    Transport { location: String, message: String },

    #[error("exchange client is closed")]
    Closed,

    #[error("unknown exchange target: {0}")]
    UnknownTarget(String),

    #[error("no more targets may be added")]
    NoMoreTargets,

    #[error(transparent)]
    Serde(#[from] SerdeError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Everything an operator can surface to the driver loop.
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("block error: {0}")]
    Block(#[from] BlockError),

    #[error("page error: {0}")]
    Page(#[from] PageError),

    #[error("serde error: {0}")]
    Serde(#[from] SerdeError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("spill error: {0}")]
    Spill(#[from] SpillError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("window error: {0}")]
    Window(#[from] WindowError),

    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("query was cancelled")]
    Cancelled,

    #[error("invalid operator state: {0}")]
    IllegalState(String),

    #[error("operator error: {0}")]
    Operator(String),
}

impl OperatorError {
    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Self::IllegalState(message.into())
    }

    pub fn log_error(&self) {
        match self {
            OperatorError::Memory(e) => {
                error!(target: "snapflow::operator", "Memory limit exceeded: {}", e);
                debug!(target: "snapflow::operator", "Memory error details: {:?}", e);
            }
            OperatorError::Spill(e) => {
                error!(target: "snapflow::operator", "Spill failed: {}", e);
                debug!(target: "snapflow::operator", "Spill error details: {:?}", e);
            }
            OperatorError::Snapshot(e) => {
                error!(target: "snapflow::operator", "Snapshot failed: {}", e);
                debug!(target: "snapflow::operator", "Snapshot error details: {:?}", e);
            }
            OperatorError::Exchange(e) => {
                error!(target: "snapflow::operator", "Exchange failed: {}", e);
                debug!(target: "snapflow::operator", "Exchange error details: {:?}", e);
            }
            OperatorError::Cancelled => {
                debug!(target: "snapflow::operator", "Query cancelled");
            }
            other => {
                error!(target: "snapflow::operator", "Operator failed: {}", other);
                debug!(target: "snapflow::operator", "Operator error details: {:?}", other);
            }
        }
    }
}
