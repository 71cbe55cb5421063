use tracing::info;

use super::{next, SchedulingService};
use crate::scheduling::access::require_role;
use crate::scheduling::domain::{EntryId, EntryStatus, PositionId, Principal, QueueEntry, Role};
use crate::scheduling::error::SchedulingError;
use crate::scheduling::store::{hold, lock, lock_all};
use crate::scheduling::views::{JumpAheadView, QueueEntryView, QueueStatusView};

/// Candidate-requested delays must fall inside this range of minutes.
pub const DELAY_RANGE: std::ops::RangeInclusive<u32> = 5..=30;

impl SchedulingService {
    /// Join a position's queue at the tail.
    pub fn join(
        &self,
        principal: &Principal,
        position_id: PositionId,
    ) -> Result<QueueEntry, SchedulingError> {
        require_role(principal, Role::Candidate, "join queues")?;
        let candidate = principal.candidate_id();
        let (window, now) = self.context();
        if !window.can_join_queue(now) {
            return Err(SchedulingError::ActivityGateClosed);
        }

        let slot = self.candidate_locks.slot(candidate);
        let _serial = hold(&slot);
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        if !queue.position().is_active {
            return Err(SchedulingError::InvalidState(format!(
                "position {position_id} is not accepting candidates"
            )));
        }
        if queue.entry(candidate).is_none()
            && self.store.membership_count(candidate) >= window.active_queue_limit as usize
        {
            return Err(SchedulingError::ActiveQueueLimitReached {
                limit: window.active_queue_limit,
            });
        }
        let id = EntryId(next(&self.sequences.entry));
        let entry = queue.join(id, candidate, &window, now)?;
        self.store.record_join(candidate, position_id);
        info!(
            position = %position_id,
            candidate = %candidate,
            rank = entry.queue_rank,
            wait = entry.estimated_wait_minutes,
            "candidate joined queue"
        );
        Ok(entry)
    }

    /// Leave a queue. An open group invitation counts as declined.
    pub fn leave(
        &self,
        principal: &Principal,
        position_id: PositionId,
    ) -> Result<QueueEntry, SchedulingError> {
        require_role(principal, Role::Candidate, "leave queues")?;
        let candidate = principal.candidate_id();
        let (window, now) = self.context();

        let slot = self.candidate_locks.slot(candidate);
        let _serial = hold(&slot);
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        let removed = queue.leave(candidate, &window, now)?;
        self.store.record_exit(candidate, position_id);
        if let Some(session) = removed.invited_to {
            let mut book = self.sessions();
            let progress = book.groups.get_mut(session)?.withdraw(candidate);
            self.settle_group(&mut queue, &mut book, session, progress, &window, now)?;
        }
        queue.promote_ready();
        drop(queue);
        self.forget_plans(candidate, position_id);
        info!(position = %position_id, candidate = %candidate, "candidate left queue");
        Ok(removed)
    }

    /// Boost an entry ahead of regular entries for `high_priority_time_limit` minutes.
    pub fn request_priority(
        &self,
        principal: &Principal,
        position_id: PositionId,
    ) -> Result<QueueEntry, SchedulingError> {
        require_role(principal, Role::Candidate, "request priority")?;
        let candidate = principal.candidate_id();
        let (window, now) = self.context();
        if !window.can_join_queue(now) {
            return Err(SchedulingError::ActivityGateClosed);
        }
        if !window.priority_window_open(now) {
            return Err(SchedulingError::PriorityWindowClosed {
                limit_minutes: window.high_priority_time_limit,
            });
        }

        let slot = self.candidate_locks.slot(candidate);
        let _serial = hold(&slot);
        let shard = self.store.shard(position_id)?;
        let entry = lock(&shard).request_priority(candidate, &window, now)?;
        info!(
            position = %position_id,
            candidate = %candidate,
            rank = entry.queue_rank,
            "priority granted"
        );
        Ok(entry)
    }

    /// Push an entry later by roughly `minutes` of service time.
    pub fn delay(
        &self,
        principal: &Principal,
        position_id: PositionId,
        minutes: u32,
    ) -> Result<QueueEntry, SchedulingError> {
        require_role(principal, Role::Candidate, "delay queue entries")?;
        if !DELAY_RANGE.contains(&minutes) {
            return Err(SchedulingError::validation(
                "minutes",
                format!(
                    "delay must be between {} and {} minutes",
                    DELAY_RANGE.start(),
                    DELAY_RANGE.end()
                ),
            ));
        }
        let candidate = principal.candidate_id();
        let (window, now) = self.context();
        let slot = self.candidate_locks.slot(candidate);
        let _serial = hold(&slot);
        let shard = self.store.shard(position_id)?;
        let entry = lock(&shard).delay(candidate, minutes, &window, now)?;
        info!(
            position = %position_id,
            candidate = %candidate,
            minutes,
            rank = entry.queue_rank,
            "entry delayed"
        );
        Ok(entry)
    }

    /// Whether the caller could spend their one-time jump in this queue right now.
    pub fn jump_ahead_check(
        &self,
        principal: &Principal,
        position_id: PositionId,
    ) -> Result<JumpAheadView, SchedulingError> {
        require_role(principal, Role::Candidate, "check jump ahead")?;
        let candidate = principal.candidate_id();
        let (window, now) = self.context();
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        match queue.plan_jump(candidate, &window, now) {
            Ok(plan) => Ok(JumpAheadView {
                position_id,
                can_jump: true,
                message: format!(
                    "Move from position {} to {} and save {} minutes",
                    plan.from_rank, plan.to_rank, plan.time_saved
                ),
                current_position: Some(plan.from_rank),
                target_position: Some(plan.to_rank),
                time_saved: Some(plan.time_saved),
            }),
            Err(error @ SchedulingError::NotQueued { .. }) => Err(error),
            Err(refusal) => Ok(JumpAheadView {
                position_id,
                can_jump: false,
                message: refusal.to_string(),
                current_position: queue.entry(candidate).map(|entry| entry.queue_rank),
                target_position: None,
                time_saved: None,
            }),
        }
    }

    /// Spend the one-time jump: pass the neighbour directly ahead.
    pub fn jump_ahead(
        &self,
        principal: &Principal,
        position_id: PositionId,
    ) -> Result<QueueEntry, SchedulingError> {
        require_role(principal, Role::Candidate, "jump ahead")?;
        let candidate = principal.candidate_id();
        let (window, now) = self.context();
        let slot = self.candidate_locks.slot(candidate);
        let _serial = hold(&slot);
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        let (entry, plan) = queue.jump_ahead(candidate, &window, now)?;
        queue.promote_ready();
        info!(
            position = %position_id,
            candidate = %candidate,
            rank = plan.to_rank,
            saved = plan.time_saved,
            "candidate jumped ahead"
        );
        Ok(entry)
    }

    /// Consistent snapshot of the caller's live memberships.
    pub fn queue_status(&self, principal: &Principal) -> Result<QueueStatusView, SchedulingError> {
        require_role(principal, Role::Candidate, "view queue status")?;
        let candidate = principal.candidate_id();
        let (window, now) = self.context();
        let shards = self.store.ordered(&self.store.positions_of(candidate))?;
        let mut guards = lock_all(&shards);
        for queue in guards.iter_mut() {
            queue.refresh(&window, now);
        }
        let priority_open = window.can_join_queue(now) && window.priority_window_open(now);
        let ledger = self.decision_ledger();
        let entries = guards
            .iter()
            .filter_map(|queue| {
                let entry = queue.entry(candidate)?;
                let can_set_priority = priority_open
                    && !entry.is_priority
                    && entry.status != EntryStatus::InInterview
                    && queue.priority_count() < window.high_priority_quota;
                Some(QueueEntryView::from_entry(
                    entry,
                    &queue.position().name,
                    queue.len(),
                    can_set_priority,
                    ledger.attend_sequence(candidate, queue.id()),
                ))
            })
            .collect();
        Ok(QueueStatusView { entries })
    }
}
