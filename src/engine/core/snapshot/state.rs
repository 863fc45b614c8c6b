use serde::{Deserialize, Serialize};

use crate::engine::core::page::Page;
use crate::engine::core::serde::{PagesSerde, SerializedPage};
use crate::engine::errors::SnapshotError;

/// Reservations held by an operator context at capture time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryState {
    pub user_bytes: u64,
    pub system_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuesState {
    pub memory: MemoryState,
    pub next_page: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitState {
    pub memory: MemoryState,
    pub remaining: u64,
    pub pending: Option<SerializedPage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopNState {
    pub memory: MemoryState,
    /// Rows currently kept by the builder, in no particular order.
    pub rows: Vec<SerializedPage>,
    pub finishing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    pub memory: MemoryState,
    /// Buffered input that has not been sorted yet.
    pub pages: Vec<SerializedPage>,
    pub finishing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeState {
    pub memory: MemoryState,
}

/// Captured state of one operator, one variant per restorable operator kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorState {
    Values(ValuesState),
    Limit(LimitState),
    TopN(TopNState),
    Window(WindowState),
    Exchange(ExchangeState),
}

impl OperatorState {
    pub fn kind(&self) -> &'static str {
        match self {
            OperatorState::Values(_) => "Values",
            OperatorState::Limit(_) => "Limit",
            OperatorState::TopN(_) => "TopN",
            OperatorState::Window(_) => "Window",
            OperatorState::Exchange(_) => "Exchange",
        }
    }

    pub fn memory(&self) -> MemoryState {
        match self {
            OperatorState::Values(s) => s.memory,
            OperatorState::Limit(s) => s.memory,
            OperatorState::TopN(s) => s.memory,
            OperatorState::Window(s) => s.memory,
            OperatorState::Exchange(s) => s.memory,
        }
    }

    pub fn mismatch(operator_id: &str, expected: &'static str) -> SnapshotError {
        SnapshotError::StateMismatch {
            operator_id: operator_id.to_string(),
            expected,
        }
    }
}

pub fn serialize_pages<'a, I>(serde: &PagesSerde, pages: I) -> Result<Vec<SerializedPage>, SnapshotError>
where
    I: IntoIterator<Item = &'a Page>,
{
    pages
        .into_iter()
        .filter(|p| p.position_count() > 0)
        .map(|p| serde.serialize(p).map_err(SnapshotError::from))
        .collect()
}

pub fn deserialize_pages(
    serde: &PagesSerde,
    pages: &[SerializedPage],
) -> Result<Vec<Page>, SnapshotError> {
    pages
        .iter()
        .map(|p| serde.deserialize(p).map_err(SnapshotError::from))
        .collect()
}
