use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    AuditNote, CandidateId, GroupSessionId, Interview, InterviewId, InterviewStatus,
    InterviewerId, PositionId,
};
use super::error::SchedulingError;
use super::group::GroupBook;

/// What an interviewer is currently occupied with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Engagement {
    Interview(InterviewId),
    Group(GroupSessionId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct InterviewerState {
    paused: bool,
    engagement: Option<Engagement>,
}

/// Per-interviewer statistics over archived interviews.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewerStats {
    pub interviewer_id: InterviewerId,
    pub completed_interviews: usize,
    pub exceptions: usize,
    pub average_duration_minutes: Option<f64>,
    pub is_paused: bool,
    pub is_busy: bool,
}

/// Interviewer availability, active interviews, the archive, and group sessions.
#[derive(Debug, Default)]
pub struct SessionBook {
    interviewers: HashMap<InterviewerId, InterviewerState>,
    active: BTreeMap<InterviewId, Interview>,
    archive: Vec<Interview>,
    pub groups: GroupBook,
}

impl SessionBook {
    pub fn is_paused(&self, interviewer: InterviewerId) -> bool {
        self.interviewers
            .get(&interviewer)
            .is_some_and(|state| state.paused)
    }

    pub fn set_paused(&mut self, interviewer: InterviewerId, paused: bool) {
        self.interviewers.entry(interviewer).or_default().paused = paused;
    }

    pub fn engagement(&self, interviewer: InterviewerId) -> Option<Engagement> {
        self.interviewers
            .get(&interviewer)
            .and_then(|state| state.engagement)
    }

    /// Paused interviewers cannot take new work; busy ones are already engaged.
    pub fn ensure_available(&self, interviewer: InterviewerId) -> Result<(), SchedulingError> {
        if self.engagement(interviewer).is_some() {
            return Err(SchedulingError::InterviewerBusy(interviewer));
        }
        if self.is_paused(interviewer) {
            return Err(SchedulingError::InvalidState(format!(
                "interviewer {interviewer} is paused"
            )));
        }
        Ok(())
    }

    pub fn engage(&mut self, interviewer: InterviewerId, engagement: Engagement) {
        self.interviewers.entry(interviewer).or_default().engagement = Some(engagement);
    }

    pub fn release(&mut self, interviewer: InterviewerId) {
        if let Some(state) = self.interviewers.get_mut(&interviewer) {
            state.engagement = None;
        }
    }

    pub fn candidate_busy(&self, candidate: CandidateId) -> bool {
        self.active
            .values()
            .any(|interview| interview.candidate_id == candidate)
    }

    pub fn open(&mut self, interview: Interview) -> Interview {
        self.active.insert(interview.id, interview.clone());
        interview
    }

    /// Active interview, distinguishing archived ids from unknown ones.
    pub fn active(&self, id: InterviewId) -> Result<&Interview, SchedulingError> {
        if let Some(interview) = self.active.get(&id) {
            return Ok(interview);
        }
        if self.archive.iter().any(|interview| interview.id == id) {
            return Err(SchedulingError::AlreadyEnded(id));
        }
        Err(SchedulingError::InterviewNotFound(id))
    }

    pub fn annotate(
        &mut self,
        id: InterviewId,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<Interview, SchedulingError> {
        self.active(id)?;
        let interview = self
            .active
            .get_mut(&id)
            .ok_or(SchedulingError::InterviewNotFound(id))?;
        interview.notes.push(AuditNote {
            recorded_at: now,
            message,
        });
        Ok(interview.clone())
    }

    /// Close an active interview and move it to the archive.
    pub fn close(
        &mut self,
        id: InterviewId,
        exception: bool,
        now: DateTime<Utc>,
    ) -> Result<Interview, SchedulingError> {
        self.active(id)?;
        let mut interview = self
            .active
            .remove(&id)
            .ok_or(SchedulingError::InterviewNotFound(id))?;
        interview.end_time = Some(now);
        interview.status = InterviewStatus::Completed;
        interview.exception_flag = exception;
        if interview.group_session.is_none() {
            self.release(interview.interviewer_id);
        }
        self.archive.push(interview.clone());
        Ok(interview)
    }

    pub fn current(&self, interviewer: InterviewerId) -> Option<&Interview> {
        match self.engagement(interviewer)? {
            Engagement::Interview(id) => self.active.get(&id),
            Engagement::Group(session) => self
                .active
                .values()
                .find(|interview| interview.group_session == Some(session)),
        }
    }

    pub fn group_interviews(&self, session: GroupSessionId) -> Vec<InterviewId> {
        self.active
            .values()
            .filter(|interview| interview.group_session == Some(session))
            .map(|interview| interview.id)
            .collect()
    }

    pub fn active_interviews(&self) -> Vec<Interview> {
        self.active.values().cloned().collect()
    }

    pub fn archived(&self) -> &[Interview] {
        &self.archive
    }

    pub fn interviewers_engaged_at(&self, position: PositionId) -> usize {
        self.active
            .values()
            .filter(|interview| interview.position_id == position)
            .map(|interview| interview.interviewer_id)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn stats(&self, interviewer: InterviewerId) -> InterviewerStats {
        let finished: Vec<&Interview> = self
            .archive
            .iter()
            .filter(|interview| interview.interviewer_id == interviewer)
            .collect();
        let durations: Vec<i64> = finished
            .iter()
            .filter_map(|interview| interview.duration_minutes())
            .collect();
        let average_duration_minutes = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
        };
        InterviewerStats {
            interviewer_id: interviewer,
            completed_interviews: finished.len(),
            exceptions: finished
                .iter()
                .filter(|interview| interview.exception_flag)
                .count(),
            average_duration_minutes,
            is_paused: self.is_paused(interviewer),
            is_busy: self.engagement(interviewer).is_some(),
        }
    }
}
