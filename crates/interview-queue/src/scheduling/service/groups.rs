use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{next, SchedulingService};
use crate::scheduling::access::require_role;
use crate::scheduling::activity::ActivityWindow;
use crate::scheduling::domain::{
    GroupSessionId, Interview, InterviewId, InterviewStatus, PositionId, Principal, Role,
};
use crate::scheduling::error::SchedulingError;
use crate::scheduling::group::{
    self, GroupProgress, GroupSession, GroupTrigger, InvitationResponse,
};
use crate::scheduling::queue::PositionQueue;
use crate::scheduling::sessions::{Engagement, SessionBook};
use crate::scheduling::store::{hold, lock};

impl SchedulingService {
    pub fn group_check(
        &self,
        principal: &Principal,
        position_id: PositionId,
    ) -> Result<GroupTrigger, SchedulingError> {
        require_role(principal, Role::Interviewer, "check group interviews")?;
        let (window, now) = self.context();
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        queue.refresh(&window, now);
        Ok(group::evaluate_trigger(
            position_id,
            &window,
            callable_count(&queue),
            now,
        ))
    }

    /// Invite the highest-ranked callable entries into a group session.
    pub fn initiate_group(
        &self,
        principal: &Principal,
        position_id: PositionId,
        max_participants: Option<u32>,
        minimum: Option<usize>,
    ) -> Result<GroupSession, SchedulingError> {
        require_role(principal, Role::Interviewer, "initiate group interviews")?;
        let interviewer = principal.interviewer_id();
        let slot = self.interviewer_locks.slot(interviewer);
        let _serial = hold(&slot);
        self.sessions().ensure_available(interviewer)?;

        let (window, now) = self.context();
        let limit = match max_participants {
            Some(0) => {
                return Err(SchedulingError::validation(
                    "max_participants",
                    "must be greater than zero",
                ))
            }
            Some(value) => value,
            None => window.group_interview_max_size,
        };
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        if !queue.position().interviewers.contains(&interviewer) {
            return Err(SchedulingError::permission(
                "serve a position they are not assigned to",
                principal.role,
            ));
        }
        queue.refresh(&window, now);
        let trigger = group::evaluate_trigger(position_id, &window, callable_count(&queue), now);
        if !trigger.should_group {
            return Err(SchedulingError::InvalidState(format!(
                "group interviews are not needed for position {position_id}: {} waiting, {} minutes left",
                trigger.waiting_count, trigger.minutes_remaining
            )));
        }

        let id = GroupSessionId(next(&self.sequences.group));
        let invited = queue.invite(id, limit as usize, &window, now);
        if invited.is_empty() {
            return Err(SchedulingError::EmptyQueue(position_id));
        }
        let session = GroupSession::new(id, position_id, interviewer, &invited, minimum, now);
        let mut book = self.sessions();
        book.engage(interviewer, Engagement::Group(id));
        book.groups.insert(session.clone());
        info!(
            session = %id,
            position = %position_id,
            invited = invited.len(),
            required = session.required_acceptances,
            "group interview initiated"
        );
        Ok(session)
    }

    /// Accept or decline a group invitation.
    pub fn respond_group(
        &self,
        principal: &Principal,
        session_id: GroupSessionId,
        accept: bool,
    ) -> Result<GroupSession, SchedulingError> {
        require_role(principal, Role::Candidate, "respond to group invitations")?;
        let candidate = principal.candidate_id();
        let slot = self.candidate_locks.slot(candidate);
        let _serial = hold(&slot);

        let position_id = self.sessions().groups.get(session_id)?.position_id;
        let (window, now) = self.context();
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        let mut book = self.sessions();
        let progress = book.groups.get_mut(session_id)?.respond(candidate, accept)?;
        if !accept {
            queue.release_invitation(candidate, session_id);
        }
        self.settle_group(&mut queue, &mut book, session_id, progress, &window, now)?;
        debug!(session = %session_id, candidate = %candidate, accept, "group invitation answered");
        book.groups.get(session_id).cloned()
    }

    /// Start or cancel a session once responses decide it.
    pub(super) fn settle_group(
        &self,
        queue: &mut PositionQueue,
        book: &mut SessionBook,
        session_id: GroupSessionId,
        progress: GroupProgress,
        window: &ActivityWindow,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        let session = book.groups.get_mut(session_id)?;
        match progress {
            GroupProgress::Collecting => {}
            GroupProgress::Quorum => {
                for candidate in session.start(now) {
                    queue.release_invitation(candidate, session_id);
                }
                let participants = session.with(InvitationResponse::Accepted);
                let interviewer = session.interviewer_id;
                queue.begin_group(session_id, &participants, window, now);
                for candidate in &participants {
                    book.open(Interview {
                        id: InterviewId(next(&self.sequences.interview)),
                        position_id: queue.id(),
                        candidate_id: *candidate,
                        interviewer_id: interviewer,
                        start_time: now,
                        end_time: None,
                        status: InterviewStatus::InProgress,
                        exception_flag: false,
                        group_session: Some(session_id),
                        notes: Vec::new(),
                    });
                }
                info!(session = %session_id, participants = participants.len(), "group interview started");
            }
            GroupProgress::Exhausted => {
                let interviewer = session.interviewer_id;
                for candidate in session.cancel(now) {
                    queue.release_invitation(candidate, session_id);
                }
                book.release(interviewer);
                queue.promote_ready();
                info!(session = %session_id, "group interview cancelled");
            }
        }
        Ok(())
    }

    /// Complete a running group session; every participant's entry is finished.
    pub fn end_group(
        &self,
        principal: &Principal,
        session_id: GroupSessionId,
    ) -> Result<GroupSession, SchedulingError> {
        require_role(principal, Role::Interviewer, "end group interviews")?;
        let interviewer = principal.interviewer_id();
        let slot = self.interviewer_locks.slot(interviewer);
        let _serial = hold(&slot);

        let position_id = {
            let book = self.sessions();
            let session = book.groups.get(session_id)?;
            if session.interviewer_id != interviewer {
                return Err(SchedulingError::permission(
                    "end another interviewer's group session",
                    principal.role,
                ));
            }
            session.position_id
        };
        let (window, now) = self.context();
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        let mut book = self.sessions();
        let participants = book.groups.get_mut(session_id)?.complete(now)?;
        for id in book.group_interviews(session_id) {
            book.close(id, false, now)?;
        }
        book.release(interviewer);
        let session = book.groups.get(session_id)?.clone();
        drop(book);

        for candidate in &participants {
            queue.complete(*candidate, &window, now);
            self.store.record_exit(*candidate, position_id);
        }
        queue.promote_ready();
        drop(queue);
        for candidate in &participants {
            self.forget_plans(*candidate, position_id);
        }
        info!(session = %session_id, completed = participants.len(), "group interview ended");
        Ok(session)
    }
}

fn callable_count(queue: &PositionQueue) -> usize {
    queue
        .entries()
        .iter()
        .filter(|entry| entry.is_callable())
        .count()
}
