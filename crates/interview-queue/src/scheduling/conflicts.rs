//! Cross-queue overlap detection for one candidate.
//!
//! Each live membership projects an attendance window `[wait, wait + interview_minutes]`.
//! Windows are swept in start order (priority first on ties); a later window that starts
//! before an earlier one ends is pushed past it by the overlap plus the buffer time.

use std::collections::BTreeMap;

use super::domain::{CandidateId, PositionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub position_id: PositionId,
    pub position_name: String,
    pub wait: u32,
    pub duration: u32,
    pub is_priority: bool,
}

impl Projection {
    pub fn end(&self) -> u32 {
        self.wait.saturating_add(self.duration)
    }

    fn overlaps_after(&self, earlier: &Projection) -> bool {
        self.wait < earlier.end()
    }
}

/// One resolution step: move `position_id` later by `minutes` so it starts at `target_wait`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub position_id: PositionId,
    pub against: PositionId,
    pub minutes: u32,
    pub target_wait: u32,
    pub message: String,
}

/// Find the shifts needed to make every pair of windows disjoint.
/// Pairs for which `settled` returns true are left alone.
pub fn detect<F>(projections: &[Projection], buffer: u32, settled: F) -> Vec<Shift>
where
    F: Fn(PositionId, PositionId) -> bool,
{
    let mut sweep = projections.to_vec();
    sweep.sort_by_key(|p| (p.wait, !p.is_priority, p.position_id));

    let mut shifts = Vec::new();
    for later in 1..sweep.len() {
        for earlier in 0..later {
            let (head, tail) = sweep.split_at_mut(later);
            let (first, second) = (&head[earlier], &mut tail[0]);
            if settled(first.position_id, second.position_id) || !second.overlaps_after(first) {
                continue;
            }
            let target_wait = first.end().saturating_add(buffer);
            let minutes = target_wait - second.wait;
            shifts.push(Shift {
                position_id: second.position_id,
                against: first.position_id,
                minutes,
                target_wait,
                message: format!(
                    "Shifted {} by {} minutes to avoid conflict with {}",
                    second.position_name, minutes, first.position_name
                ),
            });
            second.wait = target_wait;
        }
    }
    shifts
}

fn pair(a: PositionId, b: PositionId) -> (PositionId, PositionId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Latest resolution note per candidate and position pair. Detection always runs against
/// the current projections; the ledger only keeps what was last done for each pair.
#[derive(Debug, Default)]
pub struct ConflictLedger {
    notes: BTreeMap<CandidateId, BTreeMap<(PositionId, PositionId), String>>,
}

impl ConflictLedger {
    pub fn record(&mut self, candidate: CandidateId, shift: &Shift) {
        self.notes
            .entry(candidate)
            .or_default()
            .insert(pair(shift.position_id, shift.against), shift.message.clone());
    }

    pub fn messages(&self, candidate: CandidateId) -> Vec<String> {
        self.notes
            .get(&candidate)
            .map(|pairs| pairs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget every pair involving `position` once the membership ends.
    pub fn forget(&mut self, candidate: CandidateId, position: PositionId) {
        if let Some(pairs) = self.notes.get_mut(&candidate) {
            pairs.retain(|(a, b), _| *a != position && *b != position);
            if pairs.is_empty() {
                self.notes.remove(&candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection(id: u64, wait: u32, duration: u32, is_priority: bool) -> Projection {
        Projection {
            position_id: PositionId(id),
            position_name: format!("P{id}"),
            wait,
            duration,
            is_priority,
        }
    }

    #[test]
    fn disjoint_windows_need_no_shift() {
        let shifts = detect(
            &[projection(1, 0, 8, false), projection(2, 13, 8, false)],
            5,
            |_, _| false,
        );
        assert!(shifts.is_empty());
    }

    #[test]
    fn touching_windows_do_not_conflict() {
        let shifts = detect(
            &[projection(1, 0, 8, false), projection(2, 8, 8, false)],
            5,
            |_, _| false,
        );
        assert!(shifts.is_empty());
    }

    #[test]
    fn later_window_shifts_by_overlap_plus_buffer() {
        let shifts = detect(
            &[projection(2, 3, 8, false), projection(1, 0, 8, false)],
            5,
            |_, _| false,
        );
        assert_eq!(shifts.len(), 1);
        let shift = &shifts[0];
        assert_eq!(shift.position_id, PositionId(2));
        assert_eq!(shift.against, PositionId(1));
        assert_eq!(shift.minutes, 10);
        assert_eq!(shift.target_wait, 13);
        assert_eq!(
            shift.message,
            "Shifted P2 by 10 minutes to avoid conflict with P1"
        );
    }

    #[test]
    fn priority_wins_ties() {
        let shifts = detect(
            &[projection(1, 0, 8, false), projection(2, 0, 8, true)],
            5,
            |_, _| false,
        );
        assert_eq!(shifts[0].position_id, PositionId(1));
    }

    #[test]
    fn cascading_shift_clears_every_earlier_window() {
        let shifts = detect(
            &[
                projection(1, 0, 8, false),
                projection(2, 2, 20, false),
                projection(3, 5, 8, false),
            ],
            5,
            |_, _| false,
        );
        let last = shifts
            .iter()
            .filter(|shift| shift.position_id == PositionId(3))
            .last()
            .expect("third window shifted");
        assert_eq!(last.target_wait, 38);
    }

    #[test]
    fn settled_pairs_are_skipped() {
        let shifts = detect(
            &[projection(1, 0, 8, false), projection(2, 3, 8, false)],
            5,
            |_, _| true,
        );
        assert!(shifts.is_empty());
    }

    #[test]
    fn ledger_keeps_latest_note_per_pair() {
        let mut ledger = ConflictLedger::default();
        let first = detect(
            &[projection(1, 0, 8, false), projection(2, 3, 8, false)],
            5,
            |_, _| false,
        );
        ledger.record(CandidateId(4), &first[0]);
        let again = detect(
            &[projection(1, 13, 8, false), projection(2, 15, 8, false)],
            5,
            |_, _| false,
        );
        ledger.record(CandidateId(4), &again[0]);
        assert_eq!(
            ledger.messages(CandidateId(4)),
            vec!["Shifted P2 by 11 minutes to avoid conflict with P1".to_string()]
        );
    }

    #[test]
    fn ledger_forgets_pairs_of_ended_membership() {
        let mut ledger = ConflictLedger::default();
        let shifts = detect(
            &[projection(1, 0, 8, false), projection(2, 3, 8, false)],
            5,
            |_, _| false,
        );
        ledger.record(CandidateId(4), &shifts[0]);
        assert_eq!(ledger.messages(CandidateId(4)).len(), 1);

        ledger.forget(CandidateId(4), PositionId(1));
        assert!(ledger.messages(CandidateId(4)).is_empty());
    }
}
