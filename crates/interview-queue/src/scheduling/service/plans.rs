use std::collections::BTreeMap;
use std::sync::MutexGuard;

use chrono::Duration;
use tracing::{info, warn};

use super::SchedulingService;
use crate::scheduling::access::require_role;
use crate::scheduling::conflicts::{self, Projection};
use crate::scheduling::domain::{CandidateId, EntryStatus, PositionId, Principal, Role};
use crate::scheduling::error::SchedulingError;
use crate::scheduling::optimization::{
    self, Decision, Membership, PairDecision, TRANSFER_OVERHEAD_MINUTES,
};
use crate::scheduling::queue::PositionQueue;
use crate::scheduling::store::{hold, lock_all};
use crate::scheduling::views::{ConflictReport, OptimizationView, PositionTiming, QueueStatusView};

impl SchedulingService {
    /// Detect and resolve attendance overlaps across the caller's queues.
    ///
    /// Every call projects the current windows, so queue movement since an earlier run is
    /// caught again. Skipped while an undecided optimization is on offer; pairs covered by an
    /// accepted optimization are never shifted. The report lists the latest resolution per
    /// pair, so repeating the call without queue changes returns the same messages.
    pub fn conflicts(&self, principal: &Principal) -> Result<ConflictReport, SchedulingError> {
        require_role(principal, Role::Candidate, "check queue conflicts")?;
        let candidate = principal.candidate_id();
        let (window, now) = self.context();

        let slot = self.candidate_locks.slot(candidate);
        let _serial = hold(&slot);
        let shards = self.store.ordered(&self.store.positions_of(candidate))?;
        let mut guards = lock_all(&shards);
        for queue in guards.iter_mut() {
            queue.refresh(&window, now);
        }

        let memberships = memberships_of(&guards, candidate);
        let decision = self.decision_ledger().get(candidate);
        if memberships.len() >= 2 && offer(&memberships, decision).is_none() {
            let projections: Vec<Projection> = memberships
                .iter()
                .filter(|m| {
                    matches!(
                        m.status,
                        EntryStatus::Waiting | EntryStatus::Ready | EntryStatus::Delayed
                    )
                })
                .map(|m| Projection {
                    position_id: m.position_id,
                    position_name: m.position_name.clone(),
                    wait: m.wait,
                    duration: m.duration,
                    is_priority: m.is_priority,
                })
                .collect();

            let shifts = conflicts::detect(&projections, window.buffer_time, |a, b| {
                decision.is_some_and(|d| d.decision == Decision::Accepted && d.covers(a, b))
            });

            let mut targets: BTreeMap<PositionId, u32> = BTreeMap::new();
            for shift in &shifts {
                targets.insert(shift.position_id, shift.target_wait);
            }
            for (position_id, target) in targets {
                let original = projections
                    .iter()
                    .find(|p| p.position_id == position_id)
                    .map_or(0, |p| p.wait);
                if let Some(queue) = guards.iter_mut().find(|queue| queue.id() == position_id) {
                    queue.delay(candidate, target.saturating_sub(original), &window, now)?;
                    queue.hold_until(
                        candidate,
                        now + Duration::minutes(i64::from(target)),
                        &window,
                        now,
                    )?;
                }
            }

            let mut ledger = self.conflict_ledger();
            for shift in &shifts {
                warn!(candidate = %candidate, position = %shift.position_id, minutes = shift.minutes, "{}", shift.message);
                ledger.record(candidate, shift);
            }
        }
        drop(guards);

        let messages = self.conflict_ledger().messages(candidate);
        Ok(ConflictReport {
            has_conflicts: !messages.is_empty(),
            messages,
        })
    }

    /// Verdict on reordering the caller's priority and regular queues.
    pub fn optimization(&self, principal: &Principal) -> Result<OptimizationView, SchedulingError> {
        require_role(principal, Role::Candidate, "check queue optimization")?;
        let candidate = principal.candidate_id();
        let (window, now) = self.context();
        let shards = self.store.ordered(&self.store.positions_of(candidate))?;
        let mut guards = lock_all(&shards);
        for queue in guards.iter_mut() {
            queue.refresh(&window, now);
        }
        let memberships = memberships_of(&guards, candidate);
        drop(guards);

        let decision = self.decision_ledger().get(candidate);
        if decision.is_some_and(|d| d.decision == Decision::Accepted) {
            return Ok(OptimizationView::unavailable("Queue order already optimized"));
        }
        let Some((priority, regular)) = optimization::candidate_pair(&memberships) else {
            return Ok(OptimizationView::unavailable("No optimization available"));
        };
        if decision.is_some_and(|d| d.covers(priority.position_id, regular.position_id)) {
            return Ok(OptimizationView::unavailable("Optimization declined"));
        }
        let comparison = optimization::compare(priority.wait, regular.wait, TRANSFER_OVERHEAD_MINUTES);
        if !comparison.worthwhile() {
            return Ok(OptimizationView::unavailable("Current order is already fastest"));
        }
        Ok(OptimizationView {
            can_optimize: true,
            message: format!(
                "Interview for {} first ({} min wait) and then {} ({} min wait) to save {} minutes",
                regular.position_name,
                regular.wait,
                priority.position_name,
                priority.wait,
                comparison.time_saved
            ),
            regular_position: Some(PositionTiming {
                position_id: regular.position_id,
                name: regular.position_name.clone(),
                wait_time: regular.wait,
                duration: None,
            }),
            priority_position: Some(PositionTiming {
                position_id: priority.position_id,
                name: priority.position_name.clone(),
                wait_time: priority.wait,
                duration: Some(priority.duration),
            }),
            current_total: Some(comparison.current_total),
            optimized_total: Some(comparison.optimized_total),
            time_saved: Some(comparison.time_saved),
        })
    }

    /// Accept the offered reorder: the regular queue is attended first.
    pub fn apply_optimization(
        &self,
        principal: &Principal,
        regular_position: PositionId,
        priority_position: PositionId,
    ) -> Result<QueueStatusView, SchedulingError> {
        self.decide(principal, regular_position, priority_position, Decision::Accepted)?;
        self.queue_status(principal)
    }

    /// Record that the candidate keeps priority-first order.
    pub fn decline_optimization(
        &self,
        principal: &Principal,
        regular_position: PositionId,
        priority_position: PositionId,
    ) -> Result<(), SchedulingError> {
        self.decide(principal, regular_position, priority_position, Decision::Declined)
    }

    fn decide(
        &self,
        principal: &Principal,
        regular: PositionId,
        priority: PositionId,
        decision: Decision,
    ) -> Result<(), SchedulingError> {
        require_role(principal, Role::Candidate, "decide on queue optimization")?;
        let candidate = principal.candidate_id();
        let (window, now) = self.context();

        let slot = self.candidate_locks.slot(candidate);
        let _serial = hold(&slot);
        let ids = [regular, priority].into_iter().collect();
        let shards = self.store.ordered(&ids)?;
        let mut guards = lock_all(&shards);
        for queue in guards.iter_mut() {
            queue.refresh(&window, now);
            if queue.entry(candidate).is_none() {
                return Err(SchedulingError::NotQueued {
                    position: queue.id(),
                    candidate,
                });
            }
        }
        let memberships = memberships_of(&guards, candidate);
        let all_memberships = self.store.membership_count(candidate);
        let matches = all_memberships == 2
            && optimization::candidate_pair(&memberships).is_some_and(|(p, r)| {
                p.position_id == priority
                    && r.position_id == regular
                    && optimization::compare(p.wait, r.wait, TRANSFER_OVERHEAD_MINUTES).worthwhile()
            });
        if !matches {
            return Err(SchedulingError::InvalidState(
                "no optimization is available for these positions".to_string(),
            ));
        }
        self.decision_ledger().record(
            candidate,
            PairDecision {
                regular,
                priority,
                decision,
            },
        );
        info!(
            candidate = %candidate,
            regular = %regular,
            priority = %priority,
            accepted = decision == Decision::Accepted,
            "optimization decided"
        );
        Ok(())
    }
}

fn memberships_of(guards: &[MutexGuard<'_, PositionQueue>], candidate: CandidateId) -> Vec<Membership> {
    guards
        .iter()
        .filter_map(|queue| {
            let entry = queue.entry(candidate)?;
            Some(Membership {
                position_id: queue.id(),
                position_name: queue.position().name.clone(),
                wait: entry.estimated_wait_minutes,
                duration: queue.position().interview_minutes,
                is_priority: entry.is_priority,
                status: entry.status,
            })
        })
        .collect()
}

/// The pair on offer: applicable, worthwhile, and not yet decided.
fn offer(
    memberships: &[Membership],
    decision: Option<PairDecision>,
) -> Option<(PositionId, PositionId)> {
    let (priority, regular) = optimization::candidate_pair(memberships)?;
    if decision.is_some_and(|d| d.covers(priority.position_id, regular.position_id)) {
        return None;
    }
    optimization::compare(priority.wait, regular.wait, TRANSFER_OVERHEAD_MINUTES)
        .worthwhile()
        .then_some((priority.position_id, regular.position_id))
}
