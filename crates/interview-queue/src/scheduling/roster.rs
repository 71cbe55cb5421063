//! CSV seed data: bearer tokens for known users and the positions they serve.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use super::domain::{CompanyId, InterviewerId, PositionId, Principal, Role};
use super::error::SchedulingError;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to open roster file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed roster row: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unknown role `{role}`")]
    UnknownRole { row: usize, role: String },
    #[error("row {row}: company admins need a company_id")]
    MissingCompany { row: usize },
    #[error("duplicate token for user {user_id}")]
    DuplicateToken { user_id: u64 },
    #[error("position {position} has conflicting details across rows")]
    InconsistentPosition { position: PositionId },
    #[error("position {position} was rejected: {source}")]
    Rejected {
        position: PositionId,
        #[source]
        source: SchedulingError,
    },
}

/// A token and the principal it authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterUser {
    pub token: String,
    pub principal: Principal,
}

/// A position seeded at startup, merged across rows that list additional interviewers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterPosition {
    pub id: PositionId,
    pub company_id: CompanyId,
    pub name: String,
    pub description: String,
    pub interview_minutes: Option<u32>,
    pub interviewers: Vec<InterviewerId>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Roster {
    pub users: Vec<RosterUser>,
    pub positions: Vec<RosterPosition>,
}

impl Roster {
    pub fn load(users: Option<&Path>, positions: Option<&Path>) -> Result<Self, RosterError> {
        let users = match users {
            Some(path) => parse_users(open(path)?)?,
            None => Vec::new(),
        };
        let positions = match positions {
            Some(path) => parse_positions(open(path)?)?,
            None => Vec::new(),
        };
        Ok(Self { users, positions })
    }
}

fn open(path: &Path) -> Result<File, RosterError> {
    File::open(path).map_err(|source| RosterError::Open {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct UserRow {
    token: String,
    user_id: u64,
    name: String,
    role: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    company_id: Option<u64>,
}

pub fn parse_users<R: Read>(reader: R) -> Result<Vec<RosterUser>, RosterError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut users: Vec<RosterUser> = Vec::new();

    for (index, record) in csv_reader.deserialize::<UserRow>().enumerate() {
        let row = record?;
        let line = index + 2;
        let role = Role::parse(&row.role).ok_or_else(|| RosterError::UnknownRole {
            row: line,
            role: row.role.clone(),
        })?;
        let company_id = row.company_id.map(CompanyId);
        if role == Role::CompanyAdmin && company_id.is_none() {
            return Err(RosterError::MissingCompany { row: line });
        }
        if users.iter().any(|user| user.token == row.token) {
            return Err(RosterError::DuplicateToken {
                user_id: row.user_id,
            });
        }
        users.push(RosterUser {
            token: row.token,
            principal: Principal {
                user_id: row.user_id,
                name: row.name,
                role,
                company_id,
            },
        });
    }

    Ok(users)
}

#[derive(Debug, Deserialize)]
struct PositionRow {
    position_id: u64,
    company_id: u64,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    interview_minutes: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    interviewer_id: Option<u64>,
}

pub fn parse_positions<R: Read>(reader: R) -> Result<Vec<RosterPosition>, RosterError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut positions: BTreeMap<PositionId, RosterPosition> = BTreeMap::new();

    for record in csv_reader.deserialize::<PositionRow>() {
        let row = record?;
        let id = PositionId(row.position_id);
        let position = positions.entry(id).or_insert_with(|| RosterPosition {
            id,
            company_id: CompanyId(row.company_id),
            name: row.name.clone(),
            description: row.description.clone(),
            interview_minutes: row.interview_minutes,
            interviewers: Vec::new(),
        });
        if position.company_id != CompanyId(row.company_id) || position.name != row.name {
            return Err(RosterError::InconsistentPosition { position: id });
        }
        if let Some(interviewer) = row.interviewer_id.map(InterviewerId) {
            if !position.interviewers.contains(&interviewer) {
                position.interviewers.push(interviewer);
            }
        }
    }

    Ok(positions.into_values().collect())
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_parse_roles_and_companies() {
        let csv = "token,user_id,name,role,company_id\n\
                   cand-1,1,Ada,candidate,\n\
                   int-7,7,Grace,interviewer,\n\
                   boss,20,Lin,company_admin,3\n";
        let users = parse_users(csv.as_bytes()).expect("parses");
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].principal.role, Role::Candidate);
        assert_eq!(users[2].principal.company_id, Some(CompanyId(3)));
    }

    #[test]
    fn company_admin_without_company_is_rejected() {
        let csv = "token,user_id,name,role,company_id\nboss,20,Lin,company_admin,\n";
        let error = parse_users(csv.as_bytes()).expect_err("missing company");
        assert!(matches!(error, RosterError::MissingCompany { row: 2 }));
    }

    #[test]
    fn unknown_role_names_the_row() {
        let csv = "token,user_id,name,role,company_id\nx,1,Sam,guest,\n";
        let error = parse_users(csv.as_bytes()).expect_err("unknown role");
        assert!(matches!(error, RosterError::UnknownRole { row: 2, .. }));
    }

    #[test]
    fn position_rows_merge_interviewers() {
        let csv = "position_id,company_id,name,description,interview_minutes,interviewer_id\n\
                   1,3,Backend Engineer,Rust services,10,7\n\
                   1,3,Backend Engineer,Rust services,10,8\n\
                   2,3,Designer,,,\n";
        let positions = parse_positions(csv.as_bytes()).expect("parses");
        assert_eq!(positions.len(), 2);
        assert_eq!(
            positions[0].interviewers,
            vec![InterviewerId(7), InterviewerId(8)]
        );
        assert_eq!(positions[0].interview_minutes, Some(10));
        assert_eq!(positions[1].interview_minutes, None);
        assert!(positions[1].interviewers.is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let error = Roster::load(Some(Path::new("/nonexistent/users.csv")), None)
            .expect_err("missing file");
        assert!(error.to_string().contains("/nonexistent/users.csv"));
    }
}
