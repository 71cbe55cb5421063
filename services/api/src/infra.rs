use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use interview_queue::scheduling::{
    Principal, Roster, RosterError, RosterUser, SchedulingService, SessionDirectory,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Token directory backed by the roster; tokens themselves are issued elsewhere.
#[derive(Default, Clone)]
pub(crate) struct InMemorySessionDirectory {
    tokens: Arc<RwLock<HashMap<String, Principal>>>,
}

impl InMemorySessionDirectory {
    pub(crate) fn from_users(users: &[RosterUser]) -> Self {
        let directory = Self::default();
        for user in users {
            directory.insert(&user.token, user.principal.clone());
        }
        directory
    }

    pub(crate) fn insert(&self, token: &str, principal: Principal) {
        let mut guard = self.tokens.write().expect("session directory poisoned");
        guard.insert(token.to_string(), principal);
    }

    pub(crate) fn len(&self) -> usize {
        self.tokens.read().expect("session directory poisoned").len()
    }
}

impl SessionDirectory for InMemorySessionDirectory {
    fn resolve(&self, token: &str) -> Option<Principal> {
        let guard = self.tokens.read().expect("session directory poisoned");
        guard.get(token).cloned()
    }
}

/// Register every roster position with the service, stopping at the first rejection.
pub(crate) fn seed_positions(
    service: &SchedulingService,
    roster: &Roster,
) -> Result<usize, RosterError> {
    for position in &roster.positions {
        service
            .register_position(position)
            .map_err(|source| RosterError::Rejected {
                position: position.id,
                source,
            })?;
    }
    Ok(roster.positions.len())
}

/// What `roster check` reports about a roster.
#[derive(Debug, Serialize)]
pub(crate) struct RosterReport {
    pub(crate) users_by_role: BTreeMap<&'static str, usize>,
    pub(crate) positions: Vec<RosterPositionLine>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RosterPositionLine {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) interviewers: usize,
}

impl RosterReport {
    pub(crate) fn of(roster: &Roster) -> Self {
        let mut users_by_role = BTreeMap::new();
        for user in &roster.users {
            *users_by_role.entry(user.principal.role.label()).or_insert(0) += 1;
        }
        let positions = roster
            .positions
            .iter()
            .map(|position| RosterPositionLine {
                id: position.id.0,
                name: position.name.clone(),
                interviewers: position.interviewers.len(),
            })
            .collect();
        Self {
            users_by_role,
            positions,
        }
    }
}
