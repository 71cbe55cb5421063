use super::domain::{Principal, Role};
use super::error::SchedulingError;

/// Resolves bearer tokens issued elsewhere into authenticated principals.
pub trait SessionDirectory: Send + Sync {
    fn resolve(&self, token: &str) -> Option<Principal>;
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub(crate) fn require_role(
    principal: &Principal,
    role: Role,
    action: &'static str,
) -> Result<(), SchedulingError> {
    if principal.role == role {
        Ok(())
    } else {
        Err(SchedulingError::permission(action, principal.role))
    }
}
