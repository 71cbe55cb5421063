use serde::Serialize;

use super::domain::{
    CandidateId, EntryStatus, GroupSessionId, InterviewId, InterviewerId, PositionId, Role,
};

/// Coarse classification callers use to pick distinct messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    ActivityGateClosed,
    NotFound,
    Conflict,
    InvalidState,
    Validation,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::ActivityGateClosed => "activity_gate_closed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Validation => "validation",
        }
    }
}

/// Domain failures raised by the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    #[error("role {actual} may not {action}")]
    PermissionDenied { action: &'static str, actual: &'static str },
    #[error("queue joins are closed: activity is not running")]
    ActivityGateClosed,
    #[error("priority requests are closed within {limit_minutes} minutes of the activity end")]
    PriorityWindowClosed { limit_minutes: u32 },
    #[error("position {0} not found")]
    PositionNotFound(PositionId),
    #[error("interview {0} not found")]
    InterviewNotFound(InterviewId),
    #[error("group session {0} not found")]
    GroupSessionNotFound(GroupSessionId),
    #[error("candidate {candidate} is not queued for position {position}")]
    NotQueued {
        position: PositionId,
        candidate: CandidateId,
    },
    #[error("candidate {candidate} is already queued for position {position}")]
    AlreadyQueued {
        position: PositionId,
        candidate: CandidateId,
    },
    #[error("queue for position {position} is full ({limit} entries)")]
    QueueFull { position: PositionId, limit: u32 },
    #[error("candidate already holds the maximum of {limit} active queues")]
    ActiveQueueLimitReached { limit: u32 },
    #[error("priority quota of {quota} exhausted for position {position}")]
    PriorityQuotaExceeded { position: PositionId, quota: u32 },
    #[error("entry is already prioritised for position {0}")]
    AlreadyPriority(PositionId),
    #[error("jump ahead was already used for position {0}")]
    JumpAheadUsed(PositionId),
    #[error("no entry ahead can be passed for position {0}")]
    NoJumpAvailable(PositionId),
    #[error("no waiting candidate to call for position {0}")]
    EmptyQueue(PositionId),
    #[error("interviewer {0} already has an active session")]
    InterviewerBusy(InterviewerId),
    #[error("interview {0} has already ended")]
    AlreadyEnded(InterviewId),
    #[error("position {position} still has {live} live queue entries")]
    PositionHasLiveEntries { position: PositionId, live: usize },
    #[error("interviewer {interviewer} is already assigned to position {position}")]
    InterviewerAssigned {
        interviewer: InterviewerId,
        position: PositionId,
    },
    #[error("entry is {} and cannot be {action}", .status.label())]
    InvalidEntryState {
        status: EntryStatus,
        action: &'static str,
    },
    #[error("{0}")]
    InvalidState(String),
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
}

impl SchedulingError {
    pub fn permission(action: &'static str, role: Role) -> Self {
        SchedulingError::PermissionDenied {
            action,
            actual: role.label(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        SchedulingError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulingError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            SchedulingError::ActivityGateClosed | SchedulingError::PriorityWindowClosed { .. } => {
                ErrorKind::ActivityGateClosed
            }
            SchedulingError::PositionNotFound(_)
            | SchedulingError::InterviewNotFound(_)
            | SchedulingError::GroupSessionNotFound(_)
            | SchedulingError::NotQueued { .. } => ErrorKind::NotFound,
            SchedulingError::AlreadyQueued { .. }
            | SchedulingError::QueueFull { .. }
            | SchedulingError::ActiveQueueLimitReached { .. }
            | SchedulingError::PriorityQuotaExceeded { .. }
            | SchedulingError::AlreadyPriority(_)
            | SchedulingError::JumpAheadUsed(_)
            | SchedulingError::InterviewerBusy(_)
            | SchedulingError::PositionHasLiveEntries { .. }
            | SchedulingError::InterviewerAssigned { .. } => ErrorKind::Conflict,
            SchedulingError::EmptyQueue(_)
            | SchedulingError::NoJumpAvailable(_)
            | SchedulingError::AlreadyEnded(_)
            | SchedulingError::InvalidEntryState { .. }
            | SchedulingError::InvalidState(_) => ErrorKind::InvalidState,
            SchedulingError::Validation { .. } => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_onto_taxonomy() {
        assert_eq!(
            SchedulingError::permission("join queues", Role::Interviewer).kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            SchedulingError::PriorityWindowClosed { limit_minutes: 30 }.kind(),
            ErrorKind::ActivityGateClosed
        );
        assert_eq!(
            SchedulingError::PriorityQuotaExceeded {
                position: PositionId(1),
                quota: 2
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            SchedulingError::InvalidEntryState {
                status: EntryStatus::InInterview,
                action: "left",
            }
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            SchedulingError::validation("minutes", "out of range").kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn messages_name_the_offending_state() {
        let error = SchedulingError::InvalidEntryState {
            status: EntryStatus::InInterview,
            action: "left",
        };
        assert_eq!(error.to_string(), "entry is in_interview and cannot be left");
    }
}
