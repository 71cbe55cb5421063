use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::access::require_role;
use super::activity::{ActivityGate, ActivitySettingsUpdate, ActivityStatusView, ActivityWindow};
use super::clock::{Clock, SystemClock};
use super::conflicts::ConflictLedger;
use super::domain::{CandidateId, InterviewerId, PositionId, Principal, Role};
use super::error::SchedulingError;
use super::optimization::OptimizationLedger;
use super::sessions::SessionBook;
use super::store::{KeyedLocks, QueueStore};

mod admin;
mod candidate;
mod groups;
mod interviews;
mod plans;
mod positions;

pub use candidate::DELAY_RANGE;
pub use interviews::EXTENSION_RANGE;

#[derive(Debug)]
struct Sequences {
    entry: AtomicU64,
    interview: AtomicU64,
    position: AtomicU64,
    group: AtomicU64,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            entry: AtomicU64::new(1),
            interview: AtomicU64::new(1),
            position: AtomicU64::new(1),
            group: AtomicU64::new(1),
        }
    }
}

fn next(sequence: &AtomicU64) -> u64 {
    sequence.fetch_add(1, Ordering::Relaxed)
}

/// Scheduling facade composing the activity gate, queue shards, interview sessions, and
/// the per-candidate conflict and optimization ledgers.
///
/// Lock order: candidate or interviewer key lock, then position shards in ascending id,
/// then the session book, then the leaf ledgers.
pub struct SchedulingService {
    clock: Arc<dyn Clock>,
    gate: ActivityGate,
    store: QueueStore,
    sessions: Mutex<SessionBook>,
    conflicts: Mutex<ConflictLedger>,
    decisions: Mutex<OptimizationLedger>,
    candidate_locks: KeyedLocks<CandidateId>,
    interviewer_locks: KeyedLocks<InterviewerId>,
    catalog: Mutex<()>,
    sequences: Sequences,
}

impl SchedulingService {
    pub fn new(window: ActivityWindow, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            gate: ActivityGate::new(window),
            store: QueueStore::new(),
            sessions: Mutex::new(SessionBook::default()),
            conflicts: Mutex::new(ConflictLedger::default()),
            decisions: Mutex::new(OptimizationLedger::default()),
            candidate_locks: KeyedLocks::default(),
            interviewer_locks: KeyedLocks::default(),
            catalog: Mutex::new(()),
            sequences: Sequences::default(),
        }
    }

    pub fn with_system_clock(window: ActivityWindow) -> Self {
        Self::new(window, Arc::new(SystemClock))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn context(&self) -> (ActivityWindow, DateTime<Utc>) {
        (self.gate.snapshot(), self.clock.now())
    }

    fn sessions(&self) -> MutexGuard<'_, SessionBook> {
        self.sessions.lock().expect("session book poisoned")
    }

    fn conflict_ledger(&self) -> MutexGuard<'_, ConflictLedger> {
        self.conflicts.lock().expect("conflict ledger poisoned")
    }

    fn decision_ledger(&self) -> MutexGuard<'_, OptimizationLedger> {
        self.decisions.lock().expect("optimization ledger poisoned")
    }

    fn forget_plans(&self, candidate: CandidateId, position: PositionId) {
        self.conflict_ledger().forget(candidate, position);
        self.decision_ledger().forget(candidate, position);
    }

    /// Gate state, readable by every caller.
    pub fn activity_status(&self) -> ActivityStatusView {
        let (window, now) = self.context();
        window.status(now)
    }

    pub fn activity_settings(&self, principal: &Principal) -> Result<ActivityWindow, SchedulingError> {
        require_role(principal, Role::ControlAdmin, "read activity settings")?;
        Ok(self.gate.snapshot())
    }

    pub fn update_activity(
        &self,
        principal: &Principal,
        update: &ActivitySettingsUpdate,
    ) -> Result<ActivityWindow, SchedulingError> {
        require_role(principal, Role::ControlAdmin, "change activity settings")?;
        self.gate.update(update)
    }

    pub fn start_activity(&self, principal: &Principal) -> Result<ActivityWindow, SchedulingError> {
        require_role(principal, Role::ControlAdmin, "start the activity")?;
        Ok(self.gate.start(self.clock.now()))
    }

    pub fn end_activity(&self, principal: &Principal) -> Result<ActivityWindow, SchedulingError> {
        require_role(principal, Role::ControlAdmin, "end the activity")?;
        Ok(self.gate.end(self.clock.now()))
    }
}
