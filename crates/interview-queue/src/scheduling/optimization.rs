//! Two-queue attendance reordering for candidates holding one priority and one regular entry.

use std::collections::BTreeMap;

use super::domain::{CandidateId, EntryStatus, PositionId};

/// Walking time between interview venues.
pub const TRAVEL_MINUTES: u32 = 8;
/// Check-in overhead at the second venue.
pub const ADMIN_BUFFER_MINUTES: u32 = 5;
pub const TRANSFER_OVERHEAD_MINUTES: u32 = TRAVEL_MINUTES + ADMIN_BUFFER_MINUTES;

/// One live membership as seen by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub position_id: PositionId,
    pub position_name: String,
    pub wait: u32,
    pub duration: u32,
    pub is_priority: bool,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanComparison {
    pub current_total: u32,
    pub optimized_total: u32,
    pub time_saved: i64,
}

impl PlanComparison {
    pub fn worthwhile(&self) -> bool {
        self.time_saved > 0
    }
}

/// Priority-first total `Wp + (Wr + Wp + X)` against regular-first total `Wr + Wp`.
pub fn compare(priority_wait: u32, regular_wait: u32, overhead: u32) -> PlanComparison {
    let optimized_total = regular_wait.saturating_add(priority_wait);
    let current_total = optimized_total
        .saturating_add(priority_wait)
        .saturating_add(overhead);
    PlanComparison {
        current_total,
        optimized_total,
        time_saved: i64::from(current_total) - i64::from(optimized_total),
    }
}

/// The candidate's (priority, regular) pair, when the optimizer applies at all.
/// `ready` counts as waiting: it only marks the head of a queue.
pub fn candidate_pair(memberships: &[Membership]) -> Option<(&Membership, &Membership)> {
    if memberships.len() != 2 {
        return None;
    }
    if memberships
        .iter()
        .any(|membership| !membership.status.is_callable())
    {
        return None;
    }
    let priority = memberships.iter().find(|m| m.is_priority)?;
    let regular = memberships.iter().find(|m| !m.is_priority)?;
    Some((priority, regular))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Declined,
}

/// Recorded decision for one candidate's (regular, priority) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairDecision {
    pub regular: PositionId,
    pub priority: PositionId,
    pub decision: Decision,
}

impl PairDecision {
    pub fn covers(&self, a: PositionId, b: PositionId) -> bool {
        (self.regular == a && self.priority == b) || (self.regular == b && self.priority == a)
    }
}

#[derive(Debug, Default)]
pub struct OptimizationLedger {
    decisions: BTreeMap<CandidateId, PairDecision>,
}

impl OptimizationLedger {
    pub fn record(&mut self, candidate: CandidateId, decision: PairDecision) {
        self.decisions.insert(candidate, decision);
    }

    pub fn get(&self, candidate: CandidateId) -> Option<PairDecision> {
        self.decisions.get(&candidate).copied()
    }

    pub fn accepted(&self, candidate: CandidateId, a: PositionId, b: PositionId) -> bool {
        self.get(candidate)
            .is_some_and(|d| d.decision == Decision::Accepted && d.covers(a, b))
    }

    /// Personal attendance order after an accepted optimization: regular first.
    pub fn attend_sequence(&self, candidate: CandidateId, position: PositionId) -> Option<u32> {
        let decision = self.get(candidate)?;
        if decision.decision != Decision::Accepted {
            return None;
        }
        if position == decision.regular {
            Some(1)
        } else if position == decision.priority {
            Some(2)
        } else {
            None
        }
    }

    pub fn forget(&mut self, candidate: CandidateId, position: PositionId) {
        if self
            .get(candidate)
            .is_some_and(|d| d.regular == position || d.priority == position)
        {
            self.decisions.remove(&candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(id: u64, wait: u32, is_priority: bool) -> Membership {
        Membership {
            position_id: PositionId(id),
            position_name: format!("P{id}"),
            wait,
            duration: 8,
            is_priority,
            status: EntryStatus::Waiting,
        }
    }

    #[test]
    fn closed_form_matches_reference_figures() {
        let comparison = compare(10, 6, TRANSFER_OVERHEAD_MINUTES);
        assert_eq!(comparison.current_total, 39);
        assert_eq!(comparison.optimized_total, 16);
        assert_eq!(comparison.time_saved, 23);
        assert!(comparison.worthwhile());
    }

    #[test]
    fn zero_saving_is_not_offered() {
        let comparison = compare(0, 6, 0);
        assert_eq!(comparison.time_saved, 0);
        assert!(!comparison.worthwhile());
    }

    #[test]
    fn extreme_waits_saturate_instead_of_overflowing() {
        let comparison = compare(u32::MAX, u32::MAX, TRANSFER_OVERHEAD_MINUTES);
        assert_eq!(comparison.current_total, u32::MAX);
        assert_eq!(comparison.optimized_total, u32::MAX);
        assert!(!comparison.worthwhile());
    }

    #[test]
    fn pair_requires_one_priority_and_one_regular() {
        let both_regular = [membership(1, 0, false), membership(2, 13, false)];
        assert!(candidate_pair(&both_regular).is_none());

        let mixed = [membership(1, 6, false), membership(2, 10, true)];
        let (priority, regular) = candidate_pair(&mixed).expect("applies");
        assert_eq!(priority.position_id, PositionId(2));
        assert_eq!(regular.position_id, PositionId(1));

        let three = [
            membership(1, 6, false),
            membership(2, 10, true),
            membership(3, 0, false),
        ];
        assert!(candidate_pair(&three).is_none());
    }

    #[test]
    fn pair_requires_waiting_entries() {
        let mut mixed = [membership(1, 6, false), membership(2, 10, true)];
        mixed[0].status = EntryStatus::Delayed;
        assert!(candidate_pair(&mixed).is_none());
    }

    #[test]
    fn accepted_decision_orders_regular_first() {
        let mut ledger = OptimizationLedger::default();
        let candidate = CandidateId(3);
        ledger.record(
            candidate,
            PairDecision {
                regular: PositionId(1),
                priority: PositionId(2),
                decision: Decision::Accepted,
            },
        );
        assert_eq!(ledger.attend_sequence(candidate, PositionId(1)), Some(1));
        assert_eq!(ledger.attend_sequence(candidate, PositionId(2)), Some(2));
        assert!(ledger.accepted(candidate, PositionId(2), PositionId(1)));

        ledger.forget(candidate, PositionId(2));
        assert!(ledger.get(candidate).is_none());
    }
}
