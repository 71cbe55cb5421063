use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use super::domain::{CandidateId, Position, PositionId};
use super::error::SchedulingError;
use super::queue::PositionQueue;

pub type Shard = Arc<Mutex<PositionQueue>>;

/// Per-position queue shards plus the candidate membership index.
///
/// Lock order: shard mutexes (ascending position id), then the membership index.
#[derive(Debug, Default)]
pub struct QueueStore {
    shards: RwLock<BTreeMap<PositionId, Shard>>,
    memberships: Mutex<BTreeMap<CandidateId, BTreeSet<PositionId>>>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, position: Position) -> Shard {
        let id = position.id;
        let shard = Arc::new(Mutex::new(PositionQueue::new(position)));
        self.shards
            .write()
            .expect("shard map poisoned")
            .insert(id, Arc::clone(&shard));
        shard
    }

    pub fn remove(&self, id: PositionId) -> Option<Shard> {
        self.shards.write().expect("shard map poisoned").remove(&id)
    }

    pub fn shard(&self, id: PositionId) -> Result<Shard, SchedulingError> {
        self.shards
            .read()
            .expect("shard map poisoned")
            .get(&id)
            .cloned()
            .ok_or(SchedulingError::PositionNotFound(id))
    }

    /// Every shard, ascending by position id.
    pub fn all(&self) -> Vec<Shard> {
        self.shards
            .read()
            .expect("shard map poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: PositionId) -> bool {
        self.shards.read().expect("shard map poisoned").contains_key(&id)
    }

    /// Resolve shards for `ids` in ascending id order so callers can lock them deadlock-free.
    pub fn ordered(&self, ids: &BTreeSet<PositionId>) -> Result<Vec<Shard>, SchedulingError> {
        ids.iter().map(|id| self.shard(*id)).collect()
    }

    pub fn positions_of(&self, candidate: CandidateId) -> BTreeSet<PositionId> {
        self.index()
            .get(&candidate)
            .cloned()
            .unwrap_or_default()
    }

    pub fn membership_count(&self, candidate: CandidateId) -> usize {
        self.index().get(&candidate).map_or(0, BTreeSet::len)
    }

    pub fn record_join(&self, candidate: CandidateId, position: PositionId) {
        self.index().entry(candidate).or_default().insert(position);
    }

    pub fn record_exit(&self, candidate: CandidateId, position: PositionId) {
        let mut index = self.index();
        if let Some(positions) = index.get_mut(&candidate) {
            positions.remove(&position);
            if positions.is_empty() {
                index.remove(&candidate);
            }
        }
    }

    fn index(&self) -> MutexGuard<'_, BTreeMap<CandidateId, BTreeSet<PositionId>>> {
        self.memberships.lock().expect("membership index poisoned")
    }
}

pub fn lock(shard: &Shard) -> MutexGuard<'_, PositionQueue> {
    shard.lock().expect("position shard poisoned")
}

/// Lock already-ordered shards front to back.
pub fn lock_all(shards: &[Shard]) -> Vec<MutexGuard<'_, PositionQueue>> {
    shards.iter().map(lock).collect()
}

/// Lazily created mutex per key, used to serialise work for one candidate or interviewer.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Copy> KeyedLocks<K> {
    pub fn slot(&self, key: K) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().expect("keyed lock table poisoned");
        Arc::clone(slots.entry(key).or_default())
    }
}

pub fn hold(slot: &Mutex<()>) -> MutexGuard<'_, ()> {
    slot.lock().expect("keyed lock poisoned")
}
