//! Bounded recency store
//!
//! Keeps the most recently observed tokens, most-recent-first, with at most
//! one entry per token id and at most `capacity` entries overall. Entries
//! older than the configured window are removed by `sweep`.
//!
//! The ordered sequence and the id index live behind a single mutex, so a
//! reader never sees them disagree and no two mutations interleave. The lock
//! is never held across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use types::ids::TokenId;
use types::token::TokenEntry;

use crate::config::StoreConfig;

/// A mutation submitted by a producer.
///
/// `RecencyStore::apply` is the only mutation entry point; the stream
/// connector, the poller and the enricher all go through it.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCommand {
    /// Replace any entry with the same id and move it to the front.
    Upsert(TokenEntry),
    /// Update the image of the entry stored under `generation` in place.
    ///
    /// The generation comes from the outcome of the upsert the patch was
    /// issued for, so a patch never lands on an entry that replaced it.
    PatchImage {
        id: TokenId,
        generation: u64,
        image_ref: String,
    },
}

/// Result of applying a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// New id inserted; `evicted` tail entries were dropped for capacity.
    Inserted { generation: u64, evicted: usize },
    /// Existing entry with the same id replaced and moved to the front.
    Replaced { generation: u64 },
    /// Image updated in place.
    Patched,
    /// Patch for an entry that was evicted, expired or replaced.
    Ignored,
}

impl StoreOutcome {
    /// Generation assigned to the upserted entry.
    pub fn generation(&self) -> Option<u64> {
        match self {
            StoreOutcome::Inserted { generation, .. } | StoreOutcome::Replaced { generation } => {
                Some(*generation)
            }
            StoreOutcome::Patched | StoreOutcome::Ignored => None,
        }
    }

    /// Tail entries dropped for capacity by this command.
    pub fn evicted(&self) -> usize {
        match self {
            StoreOutcome::Inserted { evicted, .. } => *evicted,
            _ => 0,
        }
    }
}

/// Read-only view returned by `snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Front of the ordered sequence, most recent first.
    pub entries: Vec<TokenEntry>,
    /// Number of entries in the store, not just the returned page.
    pub total_count: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    /// Most recent first.
    order: VecDeque<TokenId>,
    entries: HashMap<TokenId, Slot>,
    /// Last generation handed out; bumped by every upsert.
    generation: u64,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    entry: TokenEntry,
}

impl StoreState {
    fn upsert(&mut self, entry: TokenEntry, capacity: usize) -> StoreOutcome {
        self.generation += 1;
        let generation = self.generation;
        let id = entry.id.clone();
        let replaced = self
            .entries
            .insert(id.clone(), Slot { generation, entry })
            .is_some();
        if replaced {
            if let Some(pos) = self.order.iter().position(|existing| *existing == id) {
                self.order.remove(pos);
            }
        }
        self.order.push_front(id);

        let mut evicted = 0;
        while self.order.len() > capacity {
            match self.order.pop_back() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    evicted += 1;
                }
                None => break,
            }
        }

        debug_assert_eq!(self.order.len(), self.entries.len());

        if replaced {
            StoreOutcome::Replaced { generation }
        } else {
            StoreOutcome::Inserted { generation, evicted }
        }
    }

    fn patch_image(&mut self, id: &TokenId, generation: u64, image_ref: String) -> StoreOutcome {
        match self.entries.get_mut(id) {
            Some(slot) if slot.generation == generation => {
                slot.entry.image_ref = Some(image_ref);
                StoreOutcome::Patched
            }
            _ => StoreOutcome::Ignored,
        }
    }

    fn sweep(&mut self, cutoff: DateTime<Utc>) -> usize {
        let StoreState { order, entries, .. } = self;
        let before = order.len();

        order.retain(|id| {
            let keep = entries
                .get(id)
                .map(|slot| !slot.entry.is_older_than(cutoff))
                .unwrap_or(false);
            if !keep {
                entries.remove(id);
            }
            keep
        });

        debug_assert_eq!(order.len(), entries.len());
        before - order.len()
    }

    fn snapshot(&self, limit: usize) -> Snapshot {
        let entries = self
            .order
            .iter()
            .take(limit)
            .filter_map(|id| self.entries.get(id).map(|slot| slot.entry.clone()))
            .collect();

        Snapshot {
            entries,
            total_count: self.order.len(),
        }
    }
}

/// Bounded, deduplicated, time-windowed collection of observed tokens.
pub struct RecencyStore {
    state: Mutex<StoreState>,
    capacity: usize,
    snapshot_max: usize,
}

impl RecencyStore {
    /// Create a new store with the given configuration.
    pub fn new(config: &StoreConfig) -> Self {
        info!(
            capacity = config.capacity,
            window_secs = config.window.as_secs(),
            "RecencyStore initialized"
        );

        Self {
            state: Mutex::new(StoreState::default()),
            capacity: config.capacity.max(1),
            snapshot_max: config.snapshot_max.max(1),
        }
    }

    /// Create a store with default limits.
    pub fn with_defaults() -> Self {
        Self::new(&StoreConfig::default())
    }

    /// Create a store holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(&StoreConfig {
            capacity,
            ..StoreConfig::default()
        })
    }

    /// Maximum number of entries kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apply a producer command atomically.
    pub fn apply(&self, command: StoreCommand) -> StoreOutcome {
        match command {
            StoreCommand::Upsert(entry) => {
                let id = entry.id.clone();
                let outcome = self.lock().upsert(entry, self.capacity);
                debug!(token = %id, ?outcome, "Upserted entry");
                outcome
            }
            StoreCommand::PatchImage {
                id,
                generation,
                image_ref,
            } => {
                let outcome = self.lock().patch_image(&id, generation, image_ref);
                debug!(token = %id, generation, ?outcome, "Image patch applied");
                outcome
            }
        }
    }

    /// Insert or replace an entry, moving it to the front.
    pub fn upsert(&self, entry: TokenEntry) -> StoreOutcome {
        self.apply(StoreCommand::Upsert(entry))
    }

    /// Update only the image of the entry stored under `generation`.
    ///
    /// Returns false when that entry was evicted, expired or replaced.
    pub fn patch_image(&self, id: &TokenId, generation: u64, image_ref: impl Into<String>) -> bool {
        let outcome = self.apply(StoreCommand::PatchImage {
            id: id.clone(),
            generation,
            image_ref: image_ref.into(),
        });
        outcome == StoreOutcome::Patched
    }

    /// Remove every entry observed before `now - window`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: DateTime<Utc>, window: Duration) -> usize {
        let Some(cutoff) = cutoff(now, window) else {
            return 0;
        };
        let removed = self.lock().sweep(cutoff);
        if removed > 0 {
            debug!(removed, %cutoff, "Swept expired entries");
        }
        removed
    }

    /// Up to `limit` entries from the front plus the total count.
    ///
    /// `limit` is clamped to the configured snapshot maximum.
    pub fn snapshot(&self, limit: usize) -> Snapshot {
        self.lock().snapshot(limit.min(self.snapshot_max))
    }

    /// Sweep and snapshot under one lock acquisition.
    ///
    /// Returns the snapshot and the number of entries swept.
    pub fn sweep_then_snapshot(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        limit: usize,
    ) -> (Snapshot, usize) {
        let mut state = self.lock();
        let removed = cutoff(now, window)
            .map(|cutoff| state.sweep(cutoff))
            .unwrap_or(0);
        (state.snapshot(limit.min(self.snapshot_max)), removed)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an entry with this id is stored.
    pub fn contains(&self, id: &TokenId) -> bool {
        self.lock().entries.contains_key(id)
    }

    /// Clone of the entry with this id, if stored.
    pub fn get(&self, id: &TokenId) -> Option<TokenEntry> {
        self.lock().entries.get(id).map(|slot| slot.entry.clone())
    }

    /// All stored ids, most recent first.
    pub fn ids(&self) -> Vec<TokenId> {
        self.lock().order.iter().cloned().collect()
    }

    // Mutations never panic mid-update, so a poisoned lock still guards a
    // consistent state.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RecencyStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn cutoff(now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
}
