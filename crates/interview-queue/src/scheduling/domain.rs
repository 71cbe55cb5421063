use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identifier for a bookable interview slot type.
    PositionId
);
numeric_id!(CandidateId);
numeric_id!(InterviewerId);
numeric_id!(CompanyId);
numeric_id!(
    /// Identifier for a queue membership.
    EntryId
);
numeric_id!(InterviewId);
numeric_id!(GroupSessionId);

/// Platform roles recognised by the scheduling core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Candidate,
    Interviewer,
    ControlAdmin,
    CompanyAdmin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Interviewer => "interviewer",
            Role::ControlAdmin => "control_admin",
            Role::CompanyAdmin => "company_admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "candidate" => Some(Role::Candidate),
            "interviewer" => Some(Role::Interviewer),
            "control_admin" | "admin" => Some(Role::ControlAdmin),
            "company_admin" => Some(Role::CompanyAdmin),
            _ => None,
        }
    }
}

/// Authenticated caller resolved from a bearer token by the session collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: u64,
    pub name: String,
    pub role: Role,
    pub company_id: Option<CompanyId>,
}

impl Principal {
    pub fn candidate(id: u64) -> Self {
        Self {
            user_id: id,
            name: format!("candidate-{id}"),
            role: Role::Candidate,
            company_id: None,
        }
    }

    pub fn interviewer(id: u64) -> Self {
        Self {
            user_id: id,
            name: format!("interviewer-{id}"),
            role: Role::Interviewer,
            company_id: None,
        }
    }

    pub fn control_admin(id: u64) -> Self {
        Self {
            user_id: id,
            name: format!("admin-{id}"),
            role: Role::ControlAdmin,
            company_id: None,
        }
    }

    pub fn company_admin(id: u64, company: CompanyId) -> Self {
        Self {
            user_id: id,
            name: format!("company-admin-{id}"),
            role: Role::CompanyAdmin,
            company_id: Some(company),
        }
    }

    pub fn candidate_id(&self) -> CandidateId {
        CandidateId(self.user_id)
    }

    pub fn interviewer_id(&self) -> InterviewerId {
        InterviewerId(self.user_id)
    }
}

/// A bookable interview slot type offered by a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub company_id: CompanyId,
    pub name: String,
    pub description: String,
    pub interview_minutes: u32,
    pub is_active: bool,
    pub interviewers: BTreeSet<InterviewerId>,
}

/// Fields supplied when a company admin creates a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDraft {
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub interview_minutes: Option<u32>,
}

/// Partial edit applied to an existing position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub interview_minutes: Option<u32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Lifecycle of a queue membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Waiting,
    Ready,
    InInterview,
    Delayed,
    Completed,
}

impl EntryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EntryStatus::Waiting => "waiting",
            EntryStatus::Ready => "ready",
            EntryStatus::InInterview => "in_interview",
            EntryStatus::Delayed => "delayed",
            EntryStatus::Completed => "completed",
        }
    }

    /// Whether an interviewer may call this entry next.
    pub const fn is_callable(self) -> bool {
        matches!(self, EntryStatus::Waiting | EntryStatus::Ready)
    }
}

/// A candidate's live membership in one position's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub position_id: PositionId,
    pub candidate_id: CandidateId,
    pub status: EntryStatus,
    pub is_priority: bool,
    pub priority_expires_at: Option<DateTime<Utc>>,
    pub queue_rank: u32,
    pub joined_at: DateTime<Utc>,
    pub estimated_wait_minutes: u32,
    /// Place among not-yet-called entries held before the last delay; reaching it again
    /// clears `Delayed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delayed_from_rank: Option<u32>,
    /// Earliest projected start imposed by conflict resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    /// Group session this entry has an open invitation to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_to: Option<GroupSessionId>,
    /// One-time move forward already spent for this membership.
    #[serde(default)]
    pub jump_ahead_used: bool,
}

impl QueueEntry {
    pub fn is_live(&self) -> bool {
        self.status != EntryStatus::Completed
    }

    /// Eligible for a one-to-one call by an interviewer.
    pub fn is_callable(&self) -> bool {
        self.status.is_callable() && self.invited_to.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    InProgress,
    Completed,
}

/// An interviewer/candidate session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub position_id: PositionId,
    pub candidate_id: CandidateId,
    pub interviewer_id: InterviewerId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: InterviewStatus,
    pub exception_flag: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_session: Option<GroupSessionId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<AuditNote>,
}

impl Interview {
    pub fn duration_minutes(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_minutes().max(0))
    }
}

/// Free-form audit trail attached to an interview (extensions, exceptions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditNote {
    pub recorded_at: DateTime<Utc>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_accepts_labels() {
        for role in [
            Role::Candidate,
            Role::Interviewer,
            Role::ControlAdmin,
            Role::CompanyAdmin,
        ] {
            assert_eq!(Role::parse(role.label()), Some(role));
        }
        assert_eq!(Role::parse(" Admin "), Some(Role::ControlAdmin));
        assert_eq!(Role::parse("guest"), None);
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let value = serde_json::to_value(PositionId(42)).expect("serializes");
        assert_eq!(value, serde_json::json!(42));
    }

    #[test]
    fn only_waiting_and_ready_are_callable() {
        assert!(EntryStatus::Waiting.is_callable());
        assert!(EntryStatus::Ready.is_callable());
        assert!(!EntryStatus::Delayed.is_callable());
        assert!(!EntryStatus::InInterview.is_callable());
        assert!(!EntryStatus::Completed.is_callable());
    }
}
