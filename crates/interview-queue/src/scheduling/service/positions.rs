use std::sync::atomic::Ordering;

use tracing::info;

use super::{next, SchedulingService};
use crate::scheduling::access::require_role;
use crate::scheduling::domain::{
    InterviewerId, Position, PositionDraft, PositionId, PositionUpdate, Principal, Role,
};
use crate::scheduling::error::SchedulingError;
use crate::scheduling::queue::PositionQueue;
use crate::scheduling::roster::RosterPosition;
use crate::scheduling::store::lock;
use crate::scheduling::views::PositionSummary;

impl SchedulingService {
    /// Register a position from seed data, keeping its id.
    pub fn register_position(&self, seed: &RosterPosition) -> Result<Position, SchedulingError> {
        let _catalog = self.catalog.lock().expect("catalog lock poisoned");
        if self.store.contains(seed.id) {
            return Err(SchedulingError::InvalidState(format!(
                "position {} is already registered",
                seed.id
            )));
        }
        for interviewer in &seed.interviewers {
            self.ensure_unassigned(*interviewer)?;
        }
        let position = Position {
            id: seed.id,
            company_id: seed.company_id,
            name: validated_name(&seed.name)?,
            description: seed.description.clone(),
            interview_minutes: self.interview_minutes(seed.interview_minutes)?,
            is_active: true,
            interviewers: seed.interviewers.iter().copied().collect(),
        };
        self.sequences
            .position
            .fetch_max(seed.id.0 + 1, Ordering::Relaxed);
        self.store.insert(position.clone());
        info!(position = %position.id, name = %position.name, "position registered");
        Ok(position)
    }

    /// Positions with live aggregates. Candidates only see active positions.
    pub fn list_positions(&self, principal: &Principal) -> Vec<PositionSummary> {
        let (window, now) = self.context();
        self.store
            .all()
            .iter()
            .filter_map(|shard| {
                let mut queue = lock(shard);
                queue.refresh(&window, now);
                let visible = match principal.role {
                    Role::Candidate => queue.position().is_active,
                    Role::CompanyAdmin => Some(queue.position().company_id) == principal.company_id,
                    Role::Interviewer | Role::ControlAdmin => true,
                };
                visible.then(|| self.summarize(&queue))
            })
            .collect()
    }

    pub(super) fn summarize(&self, queue: &PositionQueue) -> PositionSummary {
        let position = queue.position();
        let book = self.sessions();
        let available_interviewers = position
            .interviewers
            .iter()
            .filter(|interviewer| {
                !book.is_paused(**interviewer) && book.engagement(**interviewer).is_none()
            })
            .count();
        PositionSummary {
            id: position.id,
            company_id: position.company_id,
            name: position.name.clone(),
            description: position.description.clone(),
            interview_minutes: position.interview_minutes,
            is_active: position.is_active,
            interviewers: position.interviewers.iter().copied().collect(),
            candidates_in_queue: queue.waiting_count(),
            available_interviewers,
        }
    }

    pub fn create_position(
        &self,
        principal: &Principal,
        draft: PositionDraft,
    ) -> Result<Position, SchedulingError> {
        require_role(principal, Role::CompanyAdmin, "create positions")?;
        if principal.company_id != Some(draft.company_id) {
            return Err(SchedulingError::permission(
                "create positions for another company",
                principal.role,
            ));
        }
        let _catalog = self.catalog.lock().expect("catalog lock poisoned");
        let position = Position {
            id: PositionId(next(&self.sequences.position)),
            company_id: draft.company_id,
            name: validated_name(&draft.name)?,
            description: draft.description,
            interview_minutes: self.interview_minutes(draft.interview_minutes)?,
            is_active: true,
            interviewers: Default::default(),
        };
        self.store.insert(position.clone());
        info!(position = %position.id, company = %position.company_id, "position created");
        Ok(position)
    }

    pub fn update_position(
        &self,
        principal: &Principal,
        id: PositionId,
        update: PositionUpdate,
    ) -> Result<Position, SchedulingError> {
        require_role(principal, Role::CompanyAdmin, "edit positions")?;
        let shard = self.store.shard(id)?;
        let mut queue = lock(&shard);
        ensure_owner(principal, queue.position())?;

        let mut next = queue.position().clone();
        if let Some(name) = update.name {
            next.name = validated_name(&name)?;
        }
        if let Some(description) = update.description {
            next.description = description;
        }
        if let Some(minutes) = update.interview_minutes {
            next.interview_minutes = self.interview_minutes(Some(minutes))?;
        }
        if let Some(is_active) = update.is_active {
            next.is_active = is_active;
        }
        *queue.position_mut() = next.clone();
        info!(position = %id, "position updated");
        Ok(next)
    }

    /// Delete an empty position. Live entries make this a conflict rather than a cascade.
    pub fn delete_position(&self, principal: &Principal, id: PositionId) -> Result<Position, SchedulingError> {
        require_role(principal, Role::CompanyAdmin, "delete positions")?;
        let _catalog = self.catalog.lock().expect("catalog lock poisoned");
        let shard = self.store.shard(id)?;
        let mut queue = lock(&shard);
        ensure_owner(principal, queue.position())?;
        if !queue.is_empty() {
            return Err(SchedulingError::PositionHasLiveEntries {
                position: id,
                live: queue.len(),
            });
        }
        queue.position_mut().is_active = false;
        let removed = queue.position().clone();
        drop(queue);
        self.store.remove(id);
        info!(position = %id, "position deleted");
        Ok(removed)
    }

    /// Assign an interviewer; each interviewer serves at most one position.
    pub fn assign_interviewer(
        &self,
        principal: &Principal,
        id: PositionId,
        interviewer: InterviewerId,
    ) -> Result<Position, SchedulingError> {
        require_role(principal, Role::CompanyAdmin, "assign interviewers")?;
        let _catalog = self.catalog.lock().expect("catalog lock poisoned");
        let shard = self.store.shard(id)?;
        ensure_owner(principal, lock(&shard).position())?;
        self.ensure_unassigned(interviewer)?;
        let mut queue = lock(&shard);
        queue.position_mut().interviewers.insert(interviewer);
        info!(position = %id, interviewer = %interviewer, "interviewer assigned");
        Ok(queue.position().clone())
    }

    pub fn unassign_interviewer(
        &self,
        principal: &Principal,
        id: PositionId,
        interviewer: InterviewerId,
    ) -> Result<Position, SchedulingError> {
        require_role(principal, Role::CompanyAdmin, "unassign interviewers")?;
        let _catalog = self.catalog.lock().expect("catalog lock poisoned");
        let shard = self.store.shard(id)?;
        let mut queue = lock(&shard);
        ensure_owner(principal, queue.position())?;
        if !queue.position_mut().interviewers.remove(&interviewer) {
            return Err(SchedulingError::InvalidState(format!(
                "interviewer {interviewer} is not assigned to position {id}"
            )));
        }
        info!(position = %id, interviewer = %interviewer, "interviewer unassigned");
        Ok(queue.position().clone())
    }

    fn ensure_unassigned(&self, interviewer: InterviewerId) -> Result<(), SchedulingError> {
        match self.assigned_position(interviewer) {
            Some(position) => Err(SchedulingError::InterviewerAssigned {
                interviewer,
                position,
            }),
            None => Ok(()),
        }
    }

    pub(super) fn assigned_position(&self, interviewer: InterviewerId) -> Option<PositionId> {
        self.store.all().iter().find_map(|shard| {
            let queue = lock(shard);
            queue
                .position()
                .interviewers
                .contains(&interviewer)
                .then(|| queue.id())
        })
    }

    fn interview_minutes(&self, requested: Option<u32>) -> Result<u32, SchedulingError> {
        match requested {
            Some(0) => Err(SchedulingError::validation(
                "interview_minutes",
                "must be greater than zero",
            )),
            Some(minutes) => Ok(minutes),
            None => Ok(self.gate.snapshot().average_interview_time),
        }
    }
}

fn validated_name(name: &str) -> Result<String, SchedulingError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(SchedulingError::validation("name", "must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn ensure_owner(principal: &Principal, position: &Position) -> Result<(), SchedulingError> {
    if principal.company_id == Some(position.company_id) {
        Ok(())
    } else {
        Err(SchedulingError::permission(
            "manage another company's positions",
            principal.role,
        ))
    }
}
