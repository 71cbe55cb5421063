use tracing::{debug, info};

use super::{next, SchedulingService};
use crate::scheduling::access::require_role;
use crate::scheduling::domain::{
    CandidateId, Interview, InterviewId, InterviewStatus, PositionId, Principal, Role,
};
use crate::scheduling::error::SchedulingError;
use crate::scheduling::sessions::Engagement;
use crate::scheduling::store::{hold, lock};
use crate::scheduling::views::{InterviewerQueueView, InterviewerStatsView};

/// Interview extensions are recorded in this range of minutes.
pub const EXTENSION_RANGE: std::ops::RangeInclusive<u32> = 1..=30;

impl SchedulingService {
    /// Position served by the interviewer, with its queue and their current interview.
    pub fn interviewer_queue(
        &self,
        principal: &Principal,
    ) -> Result<InterviewerQueueView, SchedulingError> {
        require_role(principal, Role::Interviewer, "view interviewer queues")?;
        let interviewer = principal.interviewer_id();
        let position_id = self.assigned_position(interviewer).ok_or_else(|| {
            SchedulingError::InvalidState(format!(
                "interviewer {interviewer} has no assigned position"
            ))
        })?;
        let (window, now) = self.context();
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        queue.refresh(&window, now);
        let book = self.sessions();
        Ok(InterviewerQueueView {
            position_id,
            position_name: queue.position().name.clone(),
            entries: queue.entries().to_vec(),
            current_interview: book.current(interviewer).cloned(),
            is_paused: book.is_paused(interviewer),
        })
    }

    /// Call the next callable entry of an assigned position into interview.
    pub fn start_next(
        &self,
        principal: &Principal,
        position_id: PositionId,
    ) -> Result<Interview, SchedulingError> {
        require_role(principal, Role::Interviewer, "start interviews")?;
        let interviewer = principal.interviewer_id();
        let slot = self.interviewer_locks.slot(interviewer);
        let _serial = hold(&slot);
        self.sessions().ensure_available(interviewer)?;

        let (window, now) = self.context();
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        if !queue.position().interviewers.contains(&interviewer) {
            return Err(SchedulingError::permission(
                "serve a position they are not assigned to",
                principal.role,
            ));
        }
        let mut book = self.sessions();
        let entry = queue
            .call_next(|candidate| book.candidate_busy(candidate), &window, now)
            .ok_or(SchedulingError::EmptyQueue(position_id))?;
        let interview = book.open(Interview {
            id: InterviewId(next(&self.sequences.interview)),
            position_id,
            candidate_id: entry.candidate_id,
            interviewer_id: interviewer,
            start_time: now,
            end_time: None,
            status: InterviewStatus::InProgress,
            exception_flag: false,
            group_session: None,
            notes: Vec::new(),
        });
        book.engage(interviewer, Engagement::Interview(interview.id));
        drop(book);
        queue.promote_ready();
        info!(
            interview = %interview.id,
            position = %position_id,
            candidate = %interview.candidate_id,
            interviewer = %interviewer,
            "interview started"
        );
        Ok(interview)
    }

    /// End an interview and remove the candidate's entry.
    pub fn end_interview(
        &self,
        principal: &Principal,
        id: InterviewId,
    ) -> Result<Interview, SchedulingError> {
        self.finish_interview(principal, id, false, None)
    }

    /// End an interview flagged as an exception; the candidate is not re-queued.
    pub fn mark_exception(
        &self,
        principal: &Principal,
        id: InterviewId,
        reason: Option<String>,
    ) -> Result<Interview, SchedulingError> {
        self.finish_interview(principal, id, true, reason)
    }

    fn finish_interview(
        &self,
        principal: &Principal,
        id: InterviewId,
        exception: bool,
        reason: Option<String>,
    ) -> Result<Interview, SchedulingError> {
        require_role(principal, Role::Interviewer, "end interviews")?;
        let interviewer = principal.interviewer_id();
        let slot = self.interviewer_locks.slot(interviewer);
        let _serial = hold(&slot);
        let (position_id, candidate) = self.owned_interview(principal, id)?;

        let (window, now) = self.context();
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        let mut book = self.sessions();
        if let Some(reason) = reason {
            book.annotate(id, format!("exception: {reason}"), now)?;
        }
        let closed = book.close(id, exception, now)?;
        drop(book);
        queue.complete(candidate, &window, now);
        self.store.record_exit(candidate, position_id);
        queue.promote_ready();
        drop(queue);
        self.forget_plans(candidate, position_id);
        info!(
            interview = %id,
            position = %position_id,
            candidate = %candidate,
            exception,
            minutes = closed.duration_minutes().unwrap_or_default(),
            "interview ended"
        );
        Ok(closed)
    }

    /// Record an advisory extension; scheduling fields are unchanged.
    pub fn extend_interview(
        &self,
        principal: &Principal,
        id: InterviewId,
        minutes: u32,
    ) -> Result<Interview, SchedulingError> {
        require_role(principal, Role::Interviewer, "extend interviews")?;
        if !EXTENSION_RANGE.contains(&minutes) {
            return Err(SchedulingError::validation(
                "minutes",
                format!(
                    "extension must be between {} and {} minutes",
                    EXTENSION_RANGE.start(),
                    EXTENSION_RANGE.end()
                ),
            ));
        }
        self.owned_interview(principal, id)?;
        let now = self.clock.now();
        let interview = self
            .sessions()
            .annotate(id, format!("extended by {minutes} minutes"), now)?;
        debug!(interview = %id, minutes, "interview extension noted");
        Ok(interview)
    }

    fn owned_interview(
        &self,
        principal: &Principal,
        id: InterviewId,
    ) -> Result<(PositionId, CandidateId), SchedulingError> {
        let book = self.sessions();
        let interview = book.active(id)?;
        if interview.interviewer_id != principal.interviewer_id() {
            return Err(SchedulingError::permission(
                "manage another interviewer's interview",
                principal.role,
            ));
        }
        if interview.group_session.is_some() {
            return Err(SchedulingError::InvalidState(format!(
                "interview {id} belongs to a group session"
            )));
        }
        Ok((interview.position_id, interview.candidate_id))
    }

    pub fn current_interview(
        &self,
        principal: &Principal,
    ) -> Result<Option<Interview>, SchedulingError> {
        require_role(principal, Role::Interviewer, "view interviews")?;
        Ok(self.sessions().current(principal.interviewer_id()).cloned())
    }

    /// Pause blocks `start_next` but not ending the current interview.
    pub fn set_paused(
        &self,
        principal: &Principal,
        paused: bool,
    ) -> Result<InterviewerStatsView, SchedulingError> {
        require_role(principal, Role::Interviewer, "pause interviewing")?;
        let interviewer = principal.interviewer_id();
        let slot = self.interviewer_locks.slot(interviewer);
        let _serial = hold(&slot);
        self.sessions().set_paused(interviewer, paused);
        info!(interviewer = %interviewer, paused, "interviewer availability changed");
        self.interviewer_stats(principal)
    }

    pub fn interviewer_stats(
        &self,
        principal: &Principal,
    ) -> Result<InterviewerStatsView, SchedulingError> {
        require_role(principal, Role::Interviewer, "view interviewer statistics")?;
        let interviewer = principal.interviewer_id();
        let position_id = self.assigned_position(interviewer);
        Ok(InterviewerStatsView {
            stats: self.sessions().stats(interviewer),
            position_id,
        })
    }
}
