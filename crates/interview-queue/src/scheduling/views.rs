use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    CompanyId, EntryStatus, GroupSessionId, Interview, InterviewerId, PositionId, QueueEntry,
};
use super::group::GroupSession;
use super::sessions::InterviewerStats;

/// Position listing row with live queue aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSummary {
    pub id: PositionId,
    pub company_id: CompanyId,
    pub name: String,
    pub description: String,
    pub interview_minutes: u32,
    pub is_active: bool,
    pub interviewers: Vec<InterviewerId>,
    pub candidates_in_queue: usize,
    pub available_interviewers: usize,
}

/// One of the candidate's live memberships as shown on the status screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntryView {
    pub position_id: PositionId,
    pub position_name: String,
    pub status: EntryStatus,
    pub queue_position: u32,
    pub total_in_queue: usize,
    pub estimated_wait_time: u32,
    pub is_priority: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_expires_at: Option<DateTime<Utc>>,
    pub can_set_priority: bool,
    pub joined_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attend_sequence: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_invitation: Option<GroupSessionId>,
}

impl QueueEntryView {
    pub fn from_entry(
        entry: &QueueEntry,
        position_name: &str,
        total_in_queue: usize,
        can_set_priority: bool,
        attend_sequence: Option<u32>,
    ) -> Self {
        Self {
            position_id: entry.position_id,
            position_name: position_name.to_string(),
            status: entry.status,
            queue_position: entry.queue_rank,
            total_in_queue,
            estimated_wait_time: entry.estimated_wait_minutes,
            is_priority: entry.is_priority,
            priority_expires_at: entry.priority_expires_at,
            can_set_priority,
            joined_at: entry.joined_at,
            attend_sequence,
            group_invitation: entry.invited_to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatusView {
    pub entries: Vec<QueueEntryView>,
}

/// Verdict on a one-time jump ahead within one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JumpAheadView {
    pub position_id: PositionId,
    pub can_jump: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_saved: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub has_conflicts: bool,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionTiming {
    pub position_id: PositionId,
    pub name: String,
    pub wait_time: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizationView {
    pub can_optimize: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_position: Option<PositionTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_position: Option<PositionTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_saved: Option<i64>,
    pub message: String,
}

impl OptimizationView {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            can_optimize: false,
            regular_position: None,
            priority_position: None,
            current_total: None,
            optimized_total: None,
            time_saved: None,
            message: message.into(),
        }
    }
}

/// The interviewer's view of the position they serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterviewerQueueView {
    pub position_id: PositionId,
    pub position_name: String,
    pub entries: Vec<QueueEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_interview: Option<Interview>,
    pub is_paused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub generated_at: DateTime<Utc>,
    pub positions: Vec<PositionSummary>,
    pub waiting_entries: usize,
    pub priority_entries: usize,
    pub active_interviews: Vec<Interview>,
    pub completed_interviews: usize,
    pub exception_interviews: usize,
    pub group_sessions: Vec<GroupSession>,
}

/// An interviewer serving one of the company's positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyInterviewerView {
    pub position_id: PositionId,
    pub position_name: String,
    #[serde(flatten)]
    pub stats: InterviewerStats,
}

/// Company-wide totals over the company's positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyStatsView {
    pub company_id: CompanyId,
    pub total_positions: usize,
    pub active_positions: usize,
    pub total_interviewers: usize,
    pub candidates_in_queue: usize,
    pub active_interviews: usize,
    pub completed_interviews: usize,
    pub exception_interviews: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterviewerStatsView {
    #[serde(flatten)]
    pub stats: InterviewerStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<PositionId>,
}
