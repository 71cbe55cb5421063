use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::activity::ActivityWindow;
use super::domain::{CandidateId, GroupSessionId, InterviewerId, PositionId};
use super::error::SchedulingError;

/// Group sessions are only proposed inside this many minutes of the activity end.
pub const GROUP_TRIGGER_MINUTES: i64 = 5;

/// Whether a position should batch its remaining queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupTrigger {
    pub position_id: PositionId,
    pub should_group: bool,
    pub minutes_remaining: i64,
    pub waiting_count: usize,
    /// Interviews that still fit one by one before the end.
    pub capacity: usize,
    pub max_participants: u32,
}

pub fn evaluate_trigger(
    position: PositionId,
    window: &ActivityWindow,
    waiting_count: usize,
    now: DateTime<Utc>,
) -> GroupTrigger {
    let remaining = window.end_time - now;
    let minutes_remaining = remaining.num_minutes();
    let capacity = (minutes_remaining.max(0) / i64::from(window.average_interview_time.max(1)))
        as usize;
    let should_group =
        remaining < Duration::minutes(GROUP_TRIGGER_MINUTES) && waiting_count > capacity;
    GroupTrigger {
        position_id: position,
        should_group,
        minutes_remaining,
        waiting_count,
        capacity,
        max_participants: window.group_interview_max_size,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationResponse {
    Pending,
    Accepted,
    Declined,
    Withdrawn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invitation {
    pub candidate_id: CandidateId,
    pub queue_rank: u32,
    pub response: InvitationResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Inviting,
    InProgress,
    Completed,
    Cancelled,
}

/// What a response did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupProgress {
    Collecting,
    Quorum,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSession {
    pub id: GroupSessionId,
    pub position_id: PositionId,
    pub interviewer_id: InterviewerId,
    pub status: GroupStatus,
    pub required_acceptances: usize,
    pub invitations: Vec<Invitation>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl GroupSession {
    /// `minimum` overrides the simple-majority quorum; it is clamped to the invitee count.
    pub fn new(
        id: GroupSessionId,
        position_id: PositionId,
        interviewer_id: InterviewerId,
        invited: &[(CandidateId, u32)],
        minimum: Option<usize>,
        now: DateTime<Utc>,
    ) -> Self {
        let majority = invited.len() / 2 + 1;
        let required_acceptances = minimum.unwrap_or(majority).clamp(1, invited.len().max(1));
        Self {
            id,
            position_id,
            interviewer_id,
            status: GroupStatus::Inviting,
            required_acceptances,
            invitations: invited
                .iter()
                .map(|(candidate_id, queue_rank)| Invitation {
                    candidate_id: *candidate_id,
                    queue_rank: *queue_rank,
                    response: InvitationResponse::Pending,
                })
                .collect(),
            created_at: now,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn respond(
        &mut self,
        candidate: CandidateId,
        accept: bool,
    ) -> Result<GroupProgress, SchedulingError> {
        if self.status != GroupStatus::Inviting {
            return Err(SchedulingError::InvalidState(format!(
                "group session {} is no longer collecting responses",
                self.id
            )));
        }
        let invitation = self
            .invitations
            .iter_mut()
            .find(|invitation| invitation.candidate_id == candidate)
            .ok_or_else(|| {
                SchedulingError::InvalidState(format!(
                    "candidate {candidate} was not invited to group session {}",
                    self.id
                ))
            })?;
        if invitation.response != InvitationResponse::Pending {
            return Err(SchedulingError::InvalidState(format!(
                "candidate {candidate} already responded to group session {}",
                self.id
            )));
        }
        invitation.response = if accept {
            InvitationResponse::Accepted
        } else {
            InvitationResponse::Declined
        };
        Ok(self.progress())
    }

    /// Drop a candidate who left the queue, whatever they had answered so far.
    pub fn withdraw(&mut self, candidate: CandidateId) -> GroupProgress {
        if self.status == GroupStatus::Inviting {
            if let Some(invitation) = self
                .invitations
                .iter_mut()
                .find(|invitation| invitation.candidate_id == candidate)
            {
                invitation.response = InvitationResponse::Withdrawn;
            }
        }
        self.progress()
    }

    pub fn progress(&self) -> GroupProgress {
        if self.with(InvitationResponse::Accepted).len() >= self.required_acceptances {
            GroupProgress::Quorum
        } else if self.with(InvitationResponse::Pending).is_empty() {
            GroupProgress::Exhausted
        } else {
            GroupProgress::Collecting
        }
    }

    pub fn with(&self, response: InvitationResponse) -> Vec<CandidateId> {
        self.invitations
            .iter()
            .filter(|invitation| invitation.response == response)
            .map(|invitation| invitation.candidate_id)
            .collect()
    }

    /// Start with the accepted invitees and withdraw the rest. Returns the withdrawn candidates.
    pub fn start(&mut self, now: DateTime<Utc>) -> Vec<CandidateId> {
        self.status = GroupStatus::InProgress;
        self.started_at = Some(now);
        self.withdraw_pending()
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Vec<CandidateId> {
        self.status = GroupStatus::Cancelled;
        self.ended_at = Some(now);
        let mut released = self.with(InvitationResponse::Accepted);
        released.extend(self.withdraw_pending());
        released
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<Vec<CandidateId>, SchedulingError> {
        if self.status != GroupStatus::InProgress {
            return Err(SchedulingError::InvalidState(format!(
                "group session {} is not in progress",
                self.id
            )));
        }
        self.status = GroupStatus::Completed;
        self.ended_at = Some(now);
        Ok(self.with(InvitationResponse::Accepted))
    }

    fn withdraw_pending(&mut self) -> Vec<CandidateId> {
        let mut withdrawn = Vec::new();
        for invitation in &mut self.invitations {
            if invitation.response == InvitationResponse::Pending {
                invitation.response = InvitationResponse::Withdrawn;
                withdrawn.push(invitation.candidate_id);
            }
        }
        withdrawn
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, GroupStatus::Inviting | GroupStatus::InProgress)
    }
}

/// Registry of group sessions keyed by id.
#[derive(Debug, Default)]
pub struct GroupBook {
    sessions: BTreeMap<GroupSessionId, GroupSession>,
}

impl GroupBook {
    pub fn insert(&mut self, session: GroupSession) {
        self.sessions.insert(session.id, session);
    }

    pub fn get(&self, id: GroupSessionId) -> Result<&GroupSession, SchedulingError> {
        self.sessions
            .get(&id)
            .ok_or(SchedulingError::GroupSessionNotFound(id))
    }

    pub fn get_mut(&mut self, id: GroupSessionId) -> Result<&mut GroupSession, SchedulingError> {
        self.sessions
            .get_mut(&id)
            .ok_or(SchedulingError::GroupSessionNotFound(id))
    }

    pub fn all(&self) -> impl Iterator<Item = &GroupSession> {
        self.sessions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulingDefaults;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 16, 57, 0).unwrap()
    }

    fn closing_window() -> ActivityWindow {
        let mut window = ActivityWindow::from_defaults(&SchedulingDefaults::default(), now());
        window.start_time = now() - Duration::hours(8);
        window.end_time = now() + Duration::minutes(3);
        window
    }

    fn session(invited: usize, minimum: Option<usize>) -> GroupSession {
        let invitees: Vec<(CandidateId, u32)> = (1..=invited as u64)
            .map(|id| (CandidateId(id), id as u32))
            .collect();
        GroupSession::new(
            GroupSessionId(1),
            PositionId(1),
            InterviewerId(9),
            &invitees,
            minimum,
            now(),
        )
    }

    #[test]
    fn trigger_needs_closing_window_and_backlog() {
        let window = closing_window();
        let trigger = evaluate_trigger(PositionId(1), &window, 3, now());
        assert!(trigger.should_group);
        assert_eq!(trigger.capacity, 0);
        assert_eq!(trigger.minutes_remaining, 3);

        let idle = evaluate_trigger(PositionId(1), &window, 0, now());
        assert!(!idle.should_group);

        let early = evaluate_trigger(PositionId(1), &window, 3, now() - Duration::hours(1));
        assert!(!early.should_group);
    }

    #[test]
    fn majority_quorum_starts_session() {
        let mut session = session(4, None);
        assert_eq!(session.required_acceptances, 3);
        assert_eq!(
            session.respond(CandidateId(1), true).unwrap(),
            GroupProgress::Collecting
        );
        session.respond(CandidateId(2), false).unwrap();
        session.respond(CandidateId(3), true).unwrap();
        assert_eq!(
            session.respond(CandidateId(4), true).unwrap(),
            GroupProgress::Quorum
        );
    }

    #[test]
    fn configured_minimum_overrides_majority() {
        let mut session = session(4, Some(1));
        assert_eq!(
            session.respond(CandidateId(2), true).unwrap(),
            GroupProgress::Quorum
        );
        let withdrawn = session.start(now());
        assert_eq!(withdrawn, vec![CandidateId(1), CandidateId(3), CandidateId(4)]);
        assert_eq!(session.with(InvitationResponse::Accepted), vec![CandidateId(2)]);
    }

    #[test]
    fn all_declines_exhaust_session() {
        let mut session = session(2, None);
        session.respond(CandidateId(1), false).unwrap();
        assert_eq!(
            session.respond(CandidateId(2), false).unwrap(),
            GroupProgress::Exhausted
        );
    }

    #[test]
    fn responses_are_single_use() {
        let mut session = session(2, None);
        session.respond(CandidateId(1), true).unwrap();
        assert!(session.respond(CandidateId(1), false).is_err());
        assert!(session.respond(CandidateId(7), true).is_err());
    }

    #[test]
    fn withdrawing_an_acceptance_can_exhaust_session() {
        let mut session = session(2, None);
        session.respond(CandidateId(1), true).unwrap();
        session.respond(CandidateId(2), false).unwrap_or(GroupProgress::Collecting);
        assert_eq!(session.withdraw(CandidateId(1)), GroupProgress::Exhausted);
    }

    #[test]
    fn complete_requires_running_session() {
        let mut session = session(1, None);
        assert!(session.complete(now()).is_err());
        session.respond(CandidateId(1), true).unwrap();
        session.start(now());
        assert_eq!(session.complete(now()).unwrap(), vec![CandidateId(1)]);
        assert!(!session.is_open());
    }
}
