use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::activity::ActivityWindow;
use super::domain::{
    CandidateId, EntryId, EntryStatus, GroupSessionId, Position, PositionId, QueueEntry,
};
use super::error::SchedulingError;
use super::estimator;

/// Outcome of a jump-ahead check: ranks before and after and minutes saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpPlan {
    pub from_rank: u32,
    pub to_rank: u32,
    pub time_saved: u32,
}

/// Ordered queue for one position. Slice order is rank order: entries in interview first,
/// then priority entries in the order priority was granted, then regular entries.
#[derive(Debug, Clone)]
pub struct PositionQueue {
    position: Position,
    entries: Vec<QueueEntry>,
}

impl PositionQueue {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            entries: Vec::new(),
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn position_mut(&mut self) -> &mut Position {
        &mut self.position
    }

    pub fn id(&self) -> PositionId {
        self.position.id
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, candidate: CandidateId) -> Option<&QueueEntry> {
        self.entries.iter().find(|entry| entry.candidate_id == candidate)
    }

    pub fn waiting_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status != EntryStatus::InInterview)
            .count()
    }

    pub fn priority_count(&self) -> u32 {
        let count = self.entries.iter().filter(|entry| entry.is_priority).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn index_of(&self, candidate: CandidateId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.candidate_id == candidate)
    }

    fn require(&self, candidate: CandidateId) -> Result<usize, SchedulingError> {
        self.index_of(candidate).ok_or(SchedulingError::NotQueued {
            position: self.position.id,
            candidate,
        })
    }

    /// Expire lapsed priority boosts, restore class order, and refresh ranks and estimates.
    /// Returns the candidates whose priority lapsed.
    pub fn refresh(&mut self, window: &ActivityWindow, now: DateTime<Utc>) -> Vec<CandidateId> {
        let mut expired = Vec::new();
        for entry in &mut self.entries {
            if entry.is_priority && entry.priority_expires_at.is_some_and(|at| now >= at) {
                entry.is_priority = false;
                entry.priority_expires_at = None;
                expired.push(entry.candidate_id);
            }
        }
        if !expired.is_empty() {
            debug!(position = %self.position.id, count = expired.len(), "priority boosts expired");
        }
        self.reorder();
        self.recompute(window, now);
        expired
    }

    /// Stable partition into the three rank classes.
    fn reorder(&mut self) {
        let entries = std::mem::take(&mut self.entries);
        let (in_interview, rest): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| entry.status == EntryStatus::InInterview);
        let (priority, regular): (Vec<_>, Vec<_>) =
            rest.into_iter().partition(|entry| entry.is_priority);
        self.entries = in_interview;
        self.entries.extend(priority);
        self.entries.extend(regular);
    }

    /// Delay anchors count only entries still waiting to be called, so interviews that
    /// start ahead of a delayed entry move it toward its anchor.
    fn recompute(&mut self, window: &ActivityWindow, now: DateTime<Utc>) {
        estimator::recompute(&mut self.entries, window, now);
        let mut line_position = 0u32;
        for entry in &mut self.entries {
            if entry.status == EntryStatus::InInterview {
                continue;
            }
            line_position += 1;
            if entry.status != EntryStatus::Delayed {
                continue;
            }
            let reached = entry
                .delayed_from_rank
                .map_or(true, |anchor| line_position <= anchor);
            if reached {
                entry.status = EntryStatus::Waiting;
                entry.delayed_from_rank = None;
            }
        }
    }

    /// 1-based place of `index` among entries not yet in interview.
    fn line_position(&self, index: usize) -> u32 {
        let ahead = self.entries[..index]
            .iter()
            .filter(|entry| entry.status != EntryStatus::InInterview)
            .count();
        u32::try_from(ahead + 1).unwrap_or(u32::MAX)
    }

    pub fn join(
        &mut self,
        id: EntryId,
        candidate: CandidateId,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, SchedulingError> {
        self.refresh(window, now);
        if self.index_of(candidate).is_some() {
            return Err(SchedulingError::AlreadyQueued {
                position: self.position.id,
                candidate,
            });
        }
        if self.entries.len() >= window.max_queue_length as usize {
            return Err(SchedulingError::QueueFull {
                position: self.position.id,
                limit: window.max_queue_length,
            });
        }

        self.entries.push(QueueEntry {
            id,
            position_id: self.position.id,
            candidate_id: candidate,
            status: EntryStatus::Waiting,
            is_priority: false,
            priority_expires_at: None,
            queue_rank: 0,
            joined_at: now,
            estimated_wait_minutes: 0,
            delayed_from_rank: None,
            not_before: None,
            invited_to: None,
            jump_ahead_used: false,
        });
        self.recompute(window, now);
        self.snapshot_of(candidate)
    }

    pub fn leave(
        &mut self,
        candidate: CandidateId,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, SchedulingError> {
        self.refresh(window, now);
        let index = self.require(candidate)?;
        let status = self.entries[index].status;
        if status == EntryStatus::InInterview {
            return Err(SchedulingError::InvalidEntryState {
                status,
                action: "left",
            });
        }
        let removed = self.entries.remove(index);
        self.recompute(window, now);
        Ok(removed)
    }

    pub fn request_priority(
        &mut self,
        candidate: CandidateId,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, SchedulingError> {
        self.refresh(window, now);
        let index = self.require(candidate)?;
        let entry = &self.entries[index];
        if entry.is_priority {
            return Err(SchedulingError::AlreadyPriority(self.position.id));
        }
        if entry.status == EntryStatus::InInterview {
            return Err(SchedulingError::InvalidEntryState {
                status: entry.status,
                action: "prioritised",
            });
        }
        if self.priority_count() >= window.high_priority_quota {
            return Err(SchedulingError::PriorityQuotaExceeded {
                position: self.position.id,
                quota: window.high_priority_quota,
            });
        }

        let mut entry = self.entries.remove(index);
        entry.is_priority = true;
        entry.priority_expires_at =
            Some(now + Duration::minutes(i64::from(window.high_priority_time_limit)));
        if entry.status == EntryStatus::Delayed {
            entry.status = EntryStatus::Waiting;
            entry.delayed_from_rank = None;
        }
        let insert_at = self
            .entries
            .iter()
            .rposition(|other| other.is_priority || other.status == EntryStatus::InInterview)
            .map_or(0, |last| last + 1);
        self.entries.insert(insert_at, entry);
        self.recompute(window, now);
        self.snapshot_of(candidate)
    }

    /// Move the entry back past as many same-class followers as fit in `minutes` of service time.
    pub fn delay(
        &mut self,
        candidate: CandidateId,
        minutes: u32,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, SchedulingError> {
        self.refresh(window, now);
        let index = self.require(candidate)?;
        let status = self.entries[index].status;
        if status == EntryStatus::InInterview {
            return Err(SchedulingError::InvalidEntryState {
                status,
                action: "delayed",
            });
        }

        let is_priority = self.entries[index].is_priority;
        let class_end = self.entries[index + 1..]
            .iter()
            .position(|other| other.is_priority != is_priority)
            .map_or(self.entries.len(), |offset| index + 1 + offset);
        let followers = class_end - index - 1;
        let service = window.service_minutes().max(1);
        let passes = ((minutes / service) as usize).min(followers);

        let line_position = self.line_position(index);
        let mut entry = self.entries.remove(index);
        let anchor = entry.delayed_from_rank.unwrap_or(line_position);
        entry.status = EntryStatus::Delayed;
        entry.delayed_from_rank = Some(anchor);
        self.entries.insert(index + passes, entry);
        self.recompute(window, now);

        debug!(
            position = %self.position.id,
            candidate = %candidate,
            minutes,
            passes,
            "entry delayed"
        );
        self.snapshot_of(candidate)
    }

    /// Where a one-time jump would place the entry, without moving it.
    ///
    /// The entry may pass the neighbour directly ahead when both share a rank class, the
    /// neighbour is still waiting to be called, and the move saves at least one service slot.
    pub fn plan_jump(
        &mut self,
        candidate: CandidateId,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Result<JumpPlan, SchedulingError> {
        self.refresh(window, now);
        let index = self.require(candidate)?;
        let entry = &self.entries[index];
        if entry.jump_ahead_used {
            return Err(SchedulingError::JumpAheadUsed(self.position.id));
        }
        if !entry.status.is_callable() {
            return Err(SchedulingError::InvalidEntryState {
                status: entry.status,
                action: "moved ahead",
            });
        }
        let passable = index.checked_sub(1).filter(|&ahead| {
            let other = &self.entries[ahead];
            other.is_priority == entry.is_priority
                && other.status != EntryStatus::InInterview
                && other.invited_to.is_none()
        });
        let Some(target) = passable else {
            return Err(SchedulingError::NoJumpAvailable(self.position.id));
        };
        if entry.invited_to.is_some() {
            return Err(SchedulingError::NoJumpAvailable(self.position.id));
        }

        let mut moved = entry.clone();
        moved.queue_rank = self.entries[target].queue_rank;
        let landed = estimator::estimate(&moved, window, now);
        let time_saved = entry.estimated_wait_minutes.saturating_sub(landed);
        if time_saved < window.service_minutes() {
            return Err(SchedulingError::NoJumpAvailable(self.position.id));
        }
        Ok(JumpPlan {
            from_rank: entry.queue_rank,
            to_rank: moved.queue_rank,
            time_saved,
        })
    }

    /// Spend the entry's one-time jump, swapping it with the neighbour ahead.
    pub fn jump_ahead(
        &mut self,
        candidate: CandidateId,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Result<(QueueEntry, JumpPlan), SchedulingError> {
        let plan = self.plan_jump(candidate, window, now)?;
        let from = plan.from_rank as usize - 1;
        self.entries.swap(from, from - 1);
        self.entries[from - 1].jump_ahead_used = true;
        self.recompute(window, now);
        debug!(
            position = %self.position.id,
            candidate = %candidate,
            to_rank = plan.to_rank,
            time_saved = plan.time_saved,
            "entry jumped ahead"
        );
        Ok((self.snapshot_of(candidate)?, plan))
    }

    /// Impose an earliest projected start on one entry (conflict resolution).
    pub fn hold_until(
        &mut self,
        candidate: CandidateId,
        not_before: DateTime<Utc>,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, SchedulingError> {
        let index = self.require(candidate)?;
        let entry = &mut self.entries[index];
        entry.not_before = Some(entry.not_before.map_or(not_before, |held| held.max(not_before)));
        self.recompute(window, now);
        self.snapshot_of(candidate)
    }

    /// Take the first callable entry not excluded by `skip` into interview.
    pub fn call_next<F>(
        &mut self,
        skip: F,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Option<QueueEntry>
    where
        F: Fn(CandidateId) -> bool,
    {
        self.refresh(window, now);
        let index = self
            .entries
            .iter()
            .position(|entry| entry.is_callable() && !skip(entry.candidate_id))?;
        let entry = &mut self.entries[index];
        entry.status = EntryStatus::InInterview;
        entry.is_priority = false;
        entry.priority_expires_at = None;
        entry.not_before = None;
        entry.delayed_from_rank = None;
        let candidate = entry.candidate_id;
        self.reorder();
        self.recompute(window, now);
        self.entry(candidate).cloned()
    }

    /// Remove a finished entry.
    pub fn complete(
        &mut self,
        candidate: CandidateId,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Option<QueueEntry> {
        let index = self.index_of(candidate)?;
        let mut removed = self.entries.remove(index);
        removed.status = EntryStatus::Completed;
        self.refresh(window, now);
        Some(removed)
    }

    /// Mark the next callable entry `ready` and return any stale `ready` entry to `waiting`.
    pub fn promote_ready(&mut self) -> Option<CandidateId> {
        let head = self.entries.iter().position(QueueEntry::is_callable);
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if Some(index) == head {
                entry.status = EntryStatus::Ready;
            } else if entry.status == EntryStatus::Ready {
                entry.status = EntryStatus::Waiting;
            }
        }
        head.map(|index| self.entries[index].candidate_id)
    }

    /// Reserve up to `limit` of the highest-ranked callable entries for a group session.
    pub fn invite(
        &mut self,
        session: GroupSessionId,
        limit: usize,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Vec<(CandidateId, u32)> {
        self.refresh(window, now);
        let mut invited = Vec::new();
        for entry in &mut self.entries {
            if invited.len() >= limit {
                break;
            }
            if entry.is_callable() {
                entry.invited_to = Some(session);
                invited.push((entry.candidate_id, entry.queue_rank));
            }
        }
        invited
    }

    /// Release an invitation; the entry keeps its place among the remaining entries.
    pub fn release_invitation(&mut self, candidate: CandidateId, session: GroupSessionId) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.candidate_id == candidate && entry.invited_to == Some(session))
        {
            entry.invited_to = None;
        }
    }

    /// Move accepted invitees into interview for a group session.
    pub fn begin_group(
        &mut self,
        session: GroupSessionId,
        participants: &[CandidateId],
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) {
        for entry in &mut self.entries {
            if entry.invited_to == Some(session) && participants.contains(&entry.candidate_id) {
                entry.invited_to = None;
                entry.status = EntryStatus::InInterview;
                entry.is_priority = false;
                entry.priority_expires_at = None;
                entry.not_before = None;
            }
        }
        self.reorder();
        self.recompute(window, now);
    }

    fn snapshot_of(&self, candidate: CandidateId) -> Result<QueueEntry, SchedulingError> {
        self.entry(candidate)
            .cloned()
            .ok_or(SchedulingError::NotQueued {
                position: self.position.id,
                candidate,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulingDefaults;
    use crate::scheduling::domain::CompanyId;
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap()
    }

    fn window() -> ActivityWindow {
        ActivityWindow::from_defaults(&SchedulingDefaults::default(), now())
    }

    fn queue() -> PositionQueue {
        PositionQueue::new(Position {
            id: PositionId(7),
            company_id: CompanyId(1),
            name: "Backend Engineer".to_string(),
            description: String::new(),
            interview_minutes: 8,
            is_active: true,
            interviewers: BTreeSet::new(),
        })
    }

    fn filled(count: u64) -> PositionQueue {
        let mut queue = queue();
        for id in 1..=count {
            queue
                .join(EntryId(id), CandidateId(id), &window(), now())
                .expect("join succeeds");
        }
        queue
    }

    fn order(queue: &PositionQueue) -> Vec<u64> {
        queue.entries().iter().map(|e| e.candidate_id.0).collect()
    }

    fn assert_dense(queue: &PositionQueue) {
        let ranks: Vec<u32> = queue.entries().iter().map(|e| e.queue_rank).collect();
        let expected: Vec<u32> = (1..=queue.len() as u32).collect();
        assert_eq!(ranks, expected);
    }

    #[test]
    fn join_appends_at_tail_with_estimate() {
        let queue = filled(3);
        let last = queue.entry(CandidateId(3)).expect("queued");
        assert_eq!(last.queue_rank, 3);
        assert_eq!(last.estimated_wait_minutes, 26);
        assert_eq!(last.status, EntryStatus::Waiting);
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let mut queue = filled(1);
        let error = queue
            .join(EntryId(9), CandidateId(1), &window(), now())
            .expect_err("duplicate rejected");
        assert!(matches!(error, SchedulingError::AlreadyQueued { .. }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn full_queue_rejects_join() {
        let mut window = window();
        window.max_queue_length = 2;
        let mut queue = queue();
        queue.join(EntryId(1), CandidateId(1), &window, now()).unwrap();
        queue.join(EntryId(2), CandidateId(2), &window, now()).unwrap();
        let error = queue
            .join(EntryId(3), CandidateId(3), &window, now())
            .expect_err("full");
        assert!(matches!(error, SchedulingError::QueueFull { limit: 2, .. }));
    }

    #[test]
    fn leave_compacts_ranks() {
        let mut queue = filled(4);
        queue.leave(CandidateId(2), &window(), now()).expect("leave");
        assert_eq!(order(&queue), vec![1, 3, 4]);
        assert_dense(&queue);
        assert_eq!(queue.entry(CandidateId(4)).unwrap().estimated_wait_minutes, 26);
    }

    #[test]
    fn leave_unknown_candidate_is_not_queued() {
        let mut queue = filled(1);
        let error = queue
            .leave(CandidateId(99), &window(), now())
            .expect_err("absent");
        assert!(matches!(error, SchedulingError::NotQueued { .. }));
    }

    #[test]
    fn priority_goes_after_existing_priority_entries() {
        let mut queue = filled(4);
        queue.request_priority(CandidateId(3), &window(), now()).unwrap();
        queue.request_priority(CandidateId(4), &window(), now()).unwrap();
        assert_eq!(order(&queue), vec![3, 4, 1, 2]);
        let boosted = queue.entry(CandidateId(4)).unwrap();
        assert!(boosted.is_priority);
        assert_eq!(boosted.priority_expires_at, Some(now() + Duration::minutes(30)));
        assert_dense(&queue);
    }

    #[test]
    fn priority_quota_is_enforced_per_position() {
        let mut queue = filled(3);
        queue.request_priority(CandidateId(1), &window(), now()).unwrap();
        queue.request_priority(CandidateId(2), &window(), now()).unwrap();
        let error = queue
            .request_priority(CandidateId(3), &window(), now())
            .expect_err("quota");
        assert!(matches!(error, SchedulingError::PriorityQuotaExceeded { quota: 2, .. }));
        assert_eq!(queue.priority_count(), 2);
    }

    #[test]
    fn repeated_priority_request_is_rejected() {
        let mut queue = filled(2);
        queue.request_priority(CandidateId(2), &window(), now()).unwrap();
        let error = queue
            .request_priority(CandidateId(2), &window(), now())
            .expect_err("already");
        assert!(matches!(error, SchedulingError::AlreadyPriority(_)));
    }

    #[test]
    fn expired_priority_lands_at_front_of_regular_class() {
        let mut queue = filled(4);
        queue.request_priority(CandidateId(4), &window(), now()).unwrap();
        let later = now() + Duration::minutes(10);
        queue.request_priority(CandidateId(3), &window(), later).unwrap();
        assert_eq!(order(&queue), vec![4, 3, 1, 2]);

        let expired = queue.refresh(&window(), now() + Duration::minutes(31));
        assert_eq!(expired, vec![CandidateId(4)]);
        assert_eq!(order(&queue), vec![3, 4, 1, 2]);
        assert!(!queue.entry(CandidateId(4)).unwrap().is_priority);
        assert_eq!(queue.priority_count(), 1);
    }

    #[test]
    fn delay_passes_followers_within_minutes() {
        let mut queue = filled(5);
        let delayed = queue
            .delay(CandidateId(1), 27, &window(), now())
            .expect("delay");
        assert_eq!(order(&queue), vec![2, 3, 1, 4, 5]);
        assert_eq!(delayed.status, EntryStatus::Delayed);
        assert_eq!(delayed.queue_rank, 3);
        assert_eq!(delayed.delayed_from_rank, Some(1));
    }

    #[test]
    fn delayed_entry_returns_to_waiting_once_rank_is_reached() {
        let mut queue = filled(4);
        queue.delay(CandidateId(2), 13, &window(), now()).unwrap();
        assert_eq!(order(&queue), vec![1, 3, 2, 4]);
        queue.leave(CandidateId(1), &window(), now()).unwrap();
        let entry = queue.entry(CandidateId(2)).unwrap();
        assert_eq!(entry.queue_rank, 2);
        assert_eq!(entry.status, EntryStatus::Waiting);
        assert!(entry.delayed_from_rank.is_none());
    }

    #[test]
    fn delay_shorter_than_one_slot_keeps_place() {
        let mut queue = filled(3);
        let entry = queue.delay(CandidateId(1), 5, &window(), now()).unwrap();
        assert_eq!(entry.queue_rank, 1);
        assert_eq!(entry.status, EntryStatus::Waiting);
    }

    #[test]
    fn delay_does_not_cross_into_regular_class() {
        let mut queue = filled(3);
        queue.request_priority(CandidateId(2), &window(), now()).unwrap();
        queue.delay(CandidateId(2), 60, &window(), now()).unwrap();
        assert_eq!(order(&queue), vec![2, 1, 3]);
    }

    #[test]
    fn delayed_entry_is_next_once_the_entry_it_let_pass_is_called() {
        let mut queue = filled(3);
        queue.delay(CandidateId(1), 13, &window(), now()).unwrap();
        let first = queue.call_next(|_| false, &window(), now()).unwrap();
        assert_eq!(first.candidate_id, CandidateId(2));
        let delayed = queue.entry(CandidateId(1)).unwrap();
        assert_eq!(delayed.status, EntryStatus::Waiting);
        assert_eq!(delayed.queue_rank, 2);

        let second = queue.call_next(|_| false, &window(), now()).unwrap();
        assert_eq!(second.candidate_id, CandidateId(1));
        assert_eq!(order(&queue), vec![2, 1, 3]);
    }

    #[test]
    fn delay_anchor_ignores_entries_already_in_interview() {
        let mut queue = filled(4);
        queue.call_next(|_| false, &window(), now()).unwrap();
        let delayed = queue.delay(CandidateId(2), 13, &window(), now()).unwrap();
        assert_eq!(delayed.delayed_from_rank, Some(1));
        assert_eq!(order(&queue), vec![1, 3, 2, 4]);

        queue.call_next(|_| false, &window(), now()).unwrap();
        assert_eq!(queue.entry(CandidateId(2)).unwrap().status, EntryStatus::Waiting);
    }

    #[test]
    fn jump_ahead_swaps_with_neighbour_once() {
        let mut queue = filled(3);
        let plan = queue.plan_jump(CandidateId(3), &window(), now()).unwrap();
        assert_eq!(plan, JumpPlan { from_rank: 3, to_rank: 2, time_saved: 13 });

        let (entry, _) = queue.jump_ahead(CandidateId(3), &window(), now()).unwrap();
        assert_eq!(entry.queue_rank, 2);
        assert_eq!(entry.estimated_wait_minutes, 13);
        assert!(entry.jump_ahead_used);
        assert_eq!(order(&queue), vec![1, 3, 2]);
        assert_dense(&queue);

        let error = queue
            .jump_ahead(CandidateId(3), &window(), now())
            .expect_err("single use");
        assert!(matches!(error, SchedulingError::JumpAheadUsed(_)));
    }

    #[test]
    fn jump_ahead_needs_a_passable_neighbour() {
        let mut queue = filled(3);
        let error = queue
            .plan_jump(CandidateId(1), &window(), now())
            .expect_err("already at front");
        assert!(matches!(error, SchedulingError::NoJumpAvailable(_)));

        queue.request_priority(CandidateId(2), &window(), now()).unwrap();
        let error = queue
            .plan_jump(CandidateId(1), &window(), now())
            .expect_err("priority entry ahead");
        assert!(matches!(error, SchedulingError::NoJumpAvailable(_)));

        queue.call_next(|_| false, &window(), now()).unwrap();
        let error = queue
            .plan_jump(CandidateId(1), &window(), now())
            .expect_err("interview ahead");
        assert!(matches!(error, SchedulingError::NoJumpAvailable(_)));
    }

    #[test]
    fn jump_ahead_is_refused_when_a_hold_eats_the_saving() {
        let mut queue = filled(2);
        queue
            .hold_until(CandidateId(2), now() + Duration::minutes(30), &window(), now())
            .unwrap();
        let error = queue
            .plan_jump(CandidateId(2), &window(), now())
            .expect_err("hold keeps the wait");
        assert!(matches!(error, SchedulingError::NoJumpAvailable(_)));
    }

    #[test]
    fn call_next_moves_head_into_interview() {
        let mut queue = filled(3);
        queue.delay(CandidateId(1), 13, &window(), now()).unwrap();
        let called = queue
            .call_next(|_| false, &window(), now())
            .expect("someone callable");
        assert_eq!(called.candidate_id, CandidateId(2));
        assert_eq!(called.status, EntryStatus::InInterview);
        assert_eq!(called.queue_rank, 1);
        assert_eq!(called.estimated_wait_minutes, 0);
        assert_dense(&queue);
    }

    #[test]
    fn call_next_skips_excluded_candidates() {
        let mut queue = filled(2);
        let called = queue
            .call_next(|candidate| candidate == CandidateId(1), &window(), now())
            .expect("second candidate callable");
        assert_eq!(called.candidate_id, CandidateId(2));
    }

    #[test]
    fn leaving_mid_interview_is_invalid() {
        let mut queue = filled(1);
        queue.call_next(|_| false, &window(), now()).unwrap();
        let error = queue
            .leave(CandidateId(1), &window(), now())
            .expect_err("in interview");
        assert!(matches!(
            error,
            SchedulingError::InvalidEntryState {
                status: EntryStatus::InInterview,
                ..
            }
        ));
    }

    #[test]
    fn promote_ready_marks_single_head() {
        let mut queue = filled(3);
        queue.call_next(|_| false, &window(), now()).unwrap();
        assert_eq!(queue.promote_ready(), Some(CandidateId(2)));
        let statuses: Vec<EntryStatus> = queue.entries().iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![EntryStatus::InInterview, EntryStatus::Ready, EntryStatus::Waiting]
        );
    }

    #[test]
    fn invitations_keep_relative_rank_when_released() {
        let mut queue = filled(4);
        let session = GroupSessionId(1);
        let invited = queue.invite(session, 2, &window(), now());
        assert_eq!(invited, vec![(CandidateId(1), 1), (CandidateId(2), 2)]);

        queue.release_invitation(CandidateId(2), session);
        queue.begin_group(session, &[CandidateId(1)], &window(), now());
        assert_eq!(order(&queue), vec![1, 2, 3, 4]);
        assert_eq!(queue.entry(CandidateId(2)).unwrap().status, EntryStatus::Waiting);
        assert!(queue.entry(CandidateId(2)).unwrap().invited_to.is_none());
        assert_eq!(
            queue.entry(CandidateId(1)).unwrap().status,
            EntryStatus::InInterview
        );
    }

    #[test]
    fn complete_removes_entry() {
        let mut queue = filled(2);
        queue.call_next(|_| false, &window(), now()).unwrap();
        let done = queue
            .complete(CandidateId(1), &window(), now())
            .expect("present");
        assert_eq!(done.status, EntryStatus::Completed);
        assert_eq!(order(&queue), vec![2]);
        assert_dense(&queue);
    }
}
