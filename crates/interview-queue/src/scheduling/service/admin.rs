use super::SchedulingService;
use crate::scheduling::access::require_role;
use crate::scheduling::domain::{CompanyId, PositionId, Principal, QueueEntry, Role};
use crate::scheduling::error::SchedulingError;
use crate::scheduling::store::lock;
use crate::scheduling::views::{CompanyInterviewerView, CompanyStatsView, DashboardView};

impl SchedulingService {
    pub fn dashboard(&self, principal: &Principal) -> Result<DashboardView, SchedulingError> {
        require_role(principal, Role::ControlAdmin, "view the dashboard")?;
        let (window, now) = self.context();
        let mut waiting_entries = 0;
        let mut priority_entries = 0;
        let mut positions = Vec::new();
        for shard in self.store.all() {
            let mut queue = lock(&shard);
            queue.refresh(&window, now);
            waiting_entries += queue.waiting_count();
            priority_entries += queue.priority_count() as usize;
            positions.push(self.summarize(&queue));
        }
        let book = self.sessions();
        let archived = book.archived();
        Ok(DashboardView {
            generated_at: now,
            positions,
            waiting_entries,
            priority_entries,
            active_interviews: book.active_interviews(),
            completed_interviews: archived.len(),
            exception_interviews: archived.iter().filter(|i| i.exception_flag).count(),
            group_sessions: book.groups.all().cloned().collect(),
        })
    }

    /// Interviewers assigned to the caller's company positions, with live state.
    pub fn company_interviewers(
        &self,
        principal: &Principal,
    ) -> Result<Vec<CompanyInterviewerView>, SchedulingError> {
        let company = company_of(principal, "list company interviewers")?;
        let mut assignments = Vec::new();
        for shard in self.store.all() {
            let queue = lock(&shard);
            let position = queue.position();
            if position.company_id == company {
                assignments.extend(
                    position
                        .interviewers
                        .iter()
                        .map(|interviewer| (*interviewer, position.id, position.name.clone())),
                );
            }
        }
        let book = self.sessions();
        Ok(assignments
            .into_iter()
            .map(|(interviewer, position_id, position_name)| CompanyInterviewerView {
                position_id,
                position_name,
                stats: book.stats(interviewer),
            })
            .collect())
    }

    pub fn company_stats(&self, principal: &Principal) -> Result<CompanyStatsView, SchedulingError> {
        let company = company_of(principal, "view company stats")?;
        let (window, now) = self.context();
        let mut stats = CompanyStatsView {
            company_id: company,
            total_positions: 0,
            active_positions: 0,
            total_interviewers: 0,
            candidates_in_queue: 0,
            active_interviews: 0,
            completed_interviews: 0,
            exception_interviews: 0,
        };
        let mut owned = Vec::new();
        for shard in self.store.all() {
            let mut queue = lock(&shard);
            if queue.position().company_id != company {
                continue;
            }
            queue.refresh(&window, now);
            let position = queue.position();
            owned.push(position.id);
            stats.total_positions += 1;
            stats.active_positions += usize::from(position.is_active);
            stats.total_interviewers += position.interviewers.len();
            stats.candidates_in_queue += queue.waiting_count();
        }
        let book = self.sessions();
        stats.active_interviews = book
            .active_interviews()
            .iter()
            .filter(|interview| owned.contains(&interview.position_id))
            .count();
        for interview in book.archived() {
            if owned.contains(&interview.position_id) {
                stats.completed_interviews += 1;
                stats.exception_interviews += usize::from(interview.exception_flag);
            }
        }
        Ok(stats)
    }

    /// Snapshot of one position's queue for diagnostics and tests.
    pub fn position_queue(&self, position_id: PositionId) -> Result<Vec<QueueEntry>, SchedulingError> {
        let (window, now) = self.context();
        let shard = self.store.shard(position_id)?;
        let mut queue = lock(&shard);
        queue.refresh(&window, now);
        Ok(queue.entries().to_vec())
    }
}

fn company_of(principal: &Principal, action: &'static str) -> Result<CompanyId, SchedulingError> {
    require_role(principal, Role::CompanyAdmin, action)?;
    principal
        .company_id
        .ok_or_else(|| SchedulingError::permission(action, principal.role))
}
