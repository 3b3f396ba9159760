//! Registry of live playback processes.
//!
//! Maps each process id to its cancellation token. The lock is private and
//! only held for map access; callers cancel tokens after the entry is gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{ProcessId, SchedulerError};

struct Entry {
    generation: u64,
    token: CancellationToken,
}

/// Live processes by id.
#[derive(Default)]
pub struct ProcessRegistry {
    entries: Mutex<HashMap<ProcessId, Entry>>,
    next_generation: AtomicU64,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process. Returns the generation identifying this entry.
    pub fn insert(&self, id: &str, token: CancellationToken) -> Result<u64, SchedulerError> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();
        if entries.contains_key(id) {
            return Err(SchedulerError::DuplicateProcess(id.to_string()));
        }
        entries.insert(id.to_string(), Entry { generation, token });
        Ok(generation)
    }

    /// Remove a process, returning its token.
    pub fn remove(&self, id: &str) -> Option<CancellationToken> {
        self.entries.lock().remove(id).map(|entry| entry.token)
    }

    /// Remove the entry only if it is still the one registered as `generation`.
    pub fn remove_generation(&self, id: &str, generation: u64) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some(entry) if entry.generation == generation => {
                entries.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Remove every entry.
    pub fn drain(&self) -> Vec<(ProcessId, CancellationToken)> {
        self.entries
            .lock()
            .drain()
            .map(|(id, entry)| (id, entry.token))
            .collect()
    }

    /// Live process ids, sorted.
    pub fn ids(&self) -> Vec<ProcessId> {
        let mut ids: Vec<_> = self.entries.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
