use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use super::role::Role;
use super::session::SessionError;
use crate::audits::domain::BranchId;

/// Identity headers forwarded by the hosted auth gateway.
pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";
pub const BRANCH_HEADER: &str = "x-branch-id";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Authenticated user acting on audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<BranchId>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role,
            branch_id: None,
        }
    }

    pub fn at_branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(BranchId(branch_id.into()));
        self
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, SessionError> {
        let user_id = header_value(headers, USER_HEADER).ok_or(SessionError::MissingIdentity)?;
        let raw_role = header_value(headers, ROLE_HEADER).ok_or(SessionError::MissingIdentity)?;
        let role = Role::parse(&raw_role).ok_or(SessionError::UnknownRole(raw_role))?;
        let branch_id = header_value(headers, BRANCH_HEADER).map(BranchId);

        if role == Role::BranchManager && branch_id.is_none() {
            return Err(SessionError::MissingBranch);
        }

        Ok(Self {
            user_id: UserId(user_id),
            role,
            branch_id,
        })
    }

    /// Whether the actor's scope covers the given branch.
    pub fn covers_branch(&self, branch_id: &BranchId) -> bool {
        self.role.spans_all_branches() || self.branch_id.as_ref() == Some(branch_id)
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
