use serde::{Deserialize, Serialize};

use super::domain::{Audit, AuditStatus, SectionId};
use crate::access::{Actor, Role};

/// Requested move through the audit lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    Start,
    Complete,
    Reopen,
    Submit,
    Approve,
    Reject { reason: String },
}

impl AuditAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Reopen => "reopen",
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
        }
    }

    const fn is_review(&self) -> bool {
        matches!(self, Self::Approve | Self::Reject { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {action} an audit that is {from:?}")]
    InvalidTransition {
        from: AuditStatus,
        action: &'static str,
    },
    #[error("{role:?} is not permitted to {action} this audit")]
    Forbidden { role: Role, action: &'static str },
    #[error("a rejection reason is required")]
    MissingReason,
    #[error("audit has incomplete sections: {0:?}")]
    Incomplete(Vec<SectionId>),
}

/// Checks who may perform `action` and returns the status it leads to.
pub fn plan_transition(
    audit: &Audit,
    action: &AuditAction,
    actor: &Actor,
) -> Result<AuditStatus, LifecycleError> {
    authorize(audit, action, actor)?;

    let next = match (audit.status, action) {
        (AuditStatus::Draft, AuditAction::Start) => AuditStatus::InProgress,
        (AuditStatus::InProgress, AuditAction::Complete) => AuditStatus::Completed,
        (AuditStatus::Completed | AuditStatus::Rejected, AuditAction::Reopen) => {
            AuditStatus::InProgress
        }
        (AuditStatus::Completed, AuditAction::Submit) => AuditStatus::Submitted,
        (AuditStatus::Submitted, AuditAction::Approve) => AuditStatus::Approved,
        (AuditStatus::Submitted, AuditAction::Reject { reason }) => {
            if reason.trim().is_empty() {
                return Err(LifecycleError::MissingReason);
            }
            AuditStatus::Rejected
        }
        (from, action) => {
            return Err(LifecycleError::InvalidTransition {
                from,
                action: action.label(),
            })
        }
    };

    Ok(next)
}

fn authorize(audit: &Audit, action: &AuditAction, actor: &Actor) -> Result<(), LifecycleError> {
    let allowed = if action.is_review() {
        actor.role.can_review() && actor.covers_branch(&audit.branch.branch_id)
    } else {
        may_edit(audit, actor)
    };

    if allowed {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden {
            role: actor.role,
            action: action.label(),
        })
    }
}

/// Assigned auditor, or an admin acting on their behalf.
pub fn may_edit(audit: &Audit, actor: &Actor) -> bool {
    match actor.role {
        Role::Auditor => actor.user_id == audit.auditor,
        Role::Admin | Role::SuperAdmin => true,
        Role::BranchManager => false,
    }
}
