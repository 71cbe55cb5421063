//! Wait-time estimation for a single position.
//!
//! A position is modelled as one interviewer working at a steady cadence of
//! `average_interview_time + buffer_time` minutes per candidate, so the entry at rank `r`
//! waits for the `r - 1` entries ahead of it.

use chrono::{DateTime, Utc};

use super::activity::ActivityWindow;
use super::domain::{EntryStatus, QueueEntry};

/// `(rank - 1) * (t + b)`; rank is 1-indexed and rank 0 is treated as the head.
pub fn base_wait_minutes(rank: u32, average_interview_time: u32, buffer_time: u32) -> u32 {
    rank.saturating_sub(1)
        .saturating_mul(average_interview_time.saturating_add(buffer_time))
}

/// Whole minutes until `instant`, rounded up, or zero once it has passed.
pub fn minutes_until(instant: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let seconds = (instant - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    let minutes = (seconds + 59) / 60;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Estimate for one entry, honouring any earliest start imposed by conflict resolution.
pub fn estimate(entry: &QueueEntry, window: &ActivityWindow, now: DateTime<Utc>) -> u32 {
    if entry.status == EntryStatus::InInterview {
        return 0;
    }
    let base = base_wait_minutes(
        entry.queue_rank,
        window.average_interview_time,
        window.buffer_time,
    );
    match entry.not_before {
        Some(not_before) => base.max(minutes_until(not_before, now)),
        None => base,
    }
}

/// Assign dense ranks in slice order and refresh every estimate. O(n).
pub fn recompute(entries: &mut [QueueEntry], window: &ActivityWindow, now: DateTime<Utc>) {
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.queue_rank = u32::try_from(index + 1).unwrap_or(u32::MAX);
        if entry.not_before.is_some_and(|instant| instant <= now) {
            entry.not_before = None;
        }
        entry.estimated_wait_minutes = estimate(entry, window, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulingDefaults;
    use crate::scheduling::domain::{CandidateId, EntryId, PositionId};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap()
    }

    fn entry(id: u64) -> QueueEntry {
        QueueEntry {
            id: EntryId(id),
            position_id: PositionId(1),
            candidate_id: CandidateId(id),
            status: EntryStatus::Waiting,
            is_priority: false,
            priority_expires_at: None,
            queue_rank: 0,
            joined_at: now(),
            estimated_wait_minutes: 0,
            delayed_from_rank: None,
            not_before: None,
            invited_to: None,
            jump_ahead_used: false,
        }
    }

    #[test]
    fn head_of_queue_waits_nothing() {
        assert_eq!(base_wait_minutes(1, 8, 5), 0);
        assert_eq!(base_wait_minutes(0, 8, 5), 0);
        assert_eq!(base_wait_minutes(4, 8, 5), 39);
    }

    #[test]
    fn recompute_assigns_dense_ranks_and_cadence() {
        let window = ActivityWindow::from_defaults(&SchedulingDefaults::default(), now());
        let mut entries = vec![entry(1), entry(2), entry(3)];
        recompute(&mut entries, &window, now());
        let ranks: Vec<u32> = entries.iter().map(|e| e.queue_rank).collect();
        let waits: Vec<u32> = entries.iter().map(|e| e.estimated_wait_minutes).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(waits, vec![0, 13, 26]);
    }

    #[test]
    fn not_before_extends_but_never_shortens_estimate() {
        let window = ActivityWindow::from_defaults(&SchedulingDefaults::default(), now());
        let mut entries = vec![entry(1), entry(2)];
        entries[0].not_before = Some(now() + Duration::minutes(20));
        entries[1].not_before = Some(now() + Duration::minutes(3));
        recompute(&mut entries, &window, now());
        assert_eq!(entries[0].estimated_wait_minutes, 20);
        assert_eq!(entries[1].estimated_wait_minutes, 13);
    }

    #[test]
    fn elapsed_not_before_is_cleared() {
        let window = ActivityWindow::from_defaults(&SchedulingDefaults::default(), now());
        let mut entries = vec![entry(1)];
        entries[0].not_before = Some(now() - Duration::minutes(1));
        recompute(&mut entries, &window, now());
        assert!(entries[0].not_before.is_none());
    }

    #[test]
    fn minutes_until_rounds_partial_minutes_up() {
        assert_eq!(minutes_until(now() + Duration::seconds(61), now()), 2);
        assert_eq!(minutes_until(now() - Duration::seconds(5), now()), 0);
    }
}
