use super::common::*;
use crate::access::{Actor, Role};
use crate::audits::domain::AuditStatus;
use crate::audits::lifecycle::{plan_transition, AuditAction, LifecycleError};

#[test]
fn auditor_walks_the_happy_path() {
    let steps = [
        (AuditStatus::Draft, AuditAction::Start, AuditStatus::InProgress),
        (AuditStatus::InProgress, AuditAction::Complete, AuditStatus::Completed),
        (AuditStatus::Completed, AuditAction::Submit, AuditStatus::Submitted),
        (AuditStatus::Completed, AuditAction::Reopen, AuditStatus::InProgress),
        (AuditStatus::Rejected, AuditAction::Reopen, AuditStatus::InProgress),
    ];

    for (from, action, to) in steps {
        let audit = audit_with(from, all_answered());
        let next = plan_transition(&audit, &action, &auditor()).expect("allowed");
        assert_eq!(next, to, "{from:?} + {action:?}");
    }
}

#[test]
fn branch_manager_reviews_own_branch_only() {
    let audit = audit_with(AuditStatus::Submitted, all_answered());

    let approved = plan_transition(&audit, &AuditAction::Approve, &manager()).expect("approve");
    assert_eq!(approved, AuditStatus::Approved);

    match plan_transition(&audit, &AuditAction::Approve, &foreign_manager()) {
        Err(LifecycleError::Forbidden {
            role: Role::BranchManager,
            action: "approve",
        }) => {}
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[test]
fn auditors_cannot_review_their_own_work() {
    let audit = audit_with(AuditStatus::Submitted, all_answered());
    assert!(matches!(
        plan_transition(&audit, &AuditAction::Approve, &auditor()),
        Err(LifecycleError::Forbidden { .. })
    ));
}

#[test]
fn only_the_assigned_auditor_or_an_admin_edits() {
    let audit = audit_with(AuditStatus::Draft, Default::default());

    assert!(matches!(
        plan_transition(&audit, &AuditAction::Start, &other_auditor()),
        Err(LifecycleError::Forbidden { .. })
    ));
    assert!(matches!(
        plan_transition(&audit, &AuditAction::Start, &manager()),
        Err(LifecycleError::Forbidden { .. })
    ));
    assert_eq!(
        plan_transition(&audit, &AuditAction::Start, &admin()).expect("admin acts"),
        AuditStatus::InProgress
    );
    let super_admin = Actor::new("u-root", Role::SuperAdmin);
    assert!(plan_transition(&audit, &AuditAction::Start, &super_admin).is_ok());
}

#[test]
fn rejection_requires_a_reason() {
    let audit = audit_with(AuditStatus::Submitted, all_answered());
    let action = AuditAction::Reject {
        reason: "   ".to_string(),
    };
    assert!(matches!(
        plan_transition(&audit, &action, &manager()),
        Err(LifecycleError::MissingReason)
    ));
}

#[test]
fn out_of_order_actions_are_invalid() {
    let cases = [
        (AuditStatus::Draft, AuditAction::Submit),
        (AuditStatus::InProgress, AuditAction::Submit),
        (AuditStatus::Approved, AuditAction::Reopen),
        (AuditStatus::Submitted, AuditAction::Complete),
    ];

    for (from, action) in cases {
        let audit = audit_with(from, all_answered());
        match plan_transition(&audit, &action, &admin()) {
            Err(LifecycleError::InvalidTransition { from: reported, .. }) => {
                assert_eq!(reported, from)
            }
            other => panic!("expected invalid transition for {from:?}, got {other:?}"),
        }
    }
}
