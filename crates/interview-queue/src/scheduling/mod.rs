//! Multi-position interview queues: ranking, wait estimates, cross-queue conflict
//! resolution, two-queue reorder offers, and interview sessions.
//!
//! Each position owns a locked shard; the activity window is a separately locked,
//! read-mostly holder. All reads refresh lazily expiring state before snapshotting.

pub mod access;
pub mod activity;
pub mod clock;
pub mod conflicts;
pub mod domain;
pub mod error;
pub mod estimator;
pub mod group;
pub mod optimization;
pub mod queue;
pub mod roster;
pub mod router;
pub mod service;
pub mod sessions;
pub mod store;
pub mod views;

pub use access::{bearer_token, SessionDirectory};
pub use activity::{ActivitySettingsUpdate, ActivityStatusView, ActivityWindow};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    AuditNote, CandidateId, CompanyId, EntryId, EntryStatus, GroupSessionId, Interview,
    InterviewId, InterviewStatus, InterviewerId, Position, PositionDraft, PositionId,
    PositionUpdate, Principal, QueueEntry, Role,
};
pub use error::{ErrorKind, SchedulingError};
pub use group::{GroupSession, GroupStatus, GroupTrigger, InvitationResponse};
pub use roster::{Roster, RosterError, RosterPosition, RosterUser};
pub use router::scheduling_router;
pub use service::{SchedulingService, DELAY_RANGE, EXTENSION_RANGE};
pub use queue::JumpPlan;
pub use views::{
    CompanyInterviewerView, CompanyStatsView, ConflictReport, DashboardView,
    InterviewerQueueView, InterviewerStatsView, JumpAheadView, OptimizationView,
    PositionSummary, PositionTiming, QueueEntryView, QueueStatusView,
};
