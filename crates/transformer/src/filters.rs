// transformer/src/filters.rs

//! In-memory polling filters for `eth_newFilter` and friends.

use kaon_core::TopicSlot;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    NewFilter,
    NewBlockFilter,
    NewPendingTransactionFilter,
}

/// Log criteria of a `NewFilter`, already translated for the node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilterRequest {
    pub from_block: u64,
    pub to_block: u64,
    /// Hex without `0x`
    pub addresses: Vec<String>,
    pub topics: Vec<TopicSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub id: u64,
    pub kind: FilterKind,
    pub request: Option<LogFilterRequest>,
    /// Last block already reported
    pub last_block_number: u64,
}

/// Registry of active filters. Ids start at 1 and only grow.
#[derive(Debug)]
pub struct FilterSimulator {
    next_id: AtomicU64,
    filters: Mutex<HashMap<u64, Filter>>,
}

impl Default for FilterSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterSimulator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            filters: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Filter>> {
        self.filters.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn new_filter(&self, kind: FilterKind, request: Option<LogFilterRequest>, last_block_number: u64) -> Filter {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let filter = Filter {
            id,
            kind,
            request,
            last_block_number,
        };
        self.lock().insert(id, filter.clone());
        tracing::debug!(id, ?kind, last_block_number, "Installed filter");
        filter
    }

    /// Snapshot of a filter
    pub fn filter(&self, id: u64) -> Option<Filter> {
        self.lock().get(&id).cloned()
    }

    /// Move the cursor of a filter forward. Returns false if it is gone.
    pub fn advance(&self, id: u64, last_block_number: u64) -> bool {
        match self.lock().get_mut(&id) {
            Some(filter) => {
                filter.last_block_number = filter.last_block_number.max(last_block_number);
                true
            }
            None => false,
        }
    }

    pub fn uninstall(&self, id: u64) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
