use std::collections::BTreeMap;

use super::common::*;
use crate::audits::analytics::AnalyticsReport;
use crate::audits::domain::{Audit, AuditId, AuditStatus, BranchId, Survey, SurveyId};
use serde_json::json;

fn surveys() -> BTreeMap<SurveyId, Survey> {
    let survey = weighted_survey();
    BTreeMap::from([(survey.id.clone(), survey)])
}

#[test]
fn empty_report_has_zero_completion() {
    let audits: Vec<Audit> = Vec::new();
    let report = AnalyticsReport::build(&audits, &surveys());
    assert_eq!(report.total_audits, 0);
    assert_eq!(report.completion_rate, 0.0);
    assert_eq!(report.average_compliance, None);
    assert!(report.branches.is_empty());
}

#[test]
fn aggregates_completion_and_compliance_per_branch() {
    let mut approved = audit_with(AuditStatus::Approved, all_answered());
    approved.id = AuditId("a-1".to_string());

    let mut partial = audit_with(
        AuditStatus::InProgress,
        responses(&[("q1", json!("no")), ("q2", json!("yes"))]),
    );
    partial.id = AuditId("a-2".to_string());

    let mut elsewhere = audit_with(AuditStatus::Draft, Default::default());
    elsewhere.id = AuditId("a-3".to_string());
    elsewhere.branch.branch_id = BranchId("br-airport".to_string());

    let audits = vec![approved, partial, elsewhere];
    let report = AnalyticsReport::build(&audits, &surveys());

    assert_eq!(report.total_audits, 3);
    assert_eq!(report.completion_rate, 33.33);
    // 15/15 and 0/15 weighted points.
    assert_eq!(report.average_compliance, Some(50.0));

    let downtown = report
        .branches
        .iter()
        .find(|row| row.branch_id.0 == BRANCH)
        .expect("downtown row");
    assert_eq!(downtown.audits, 2);
    assert_eq!(downtown.finished, 1);
    assert_eq!(downtown.scored, 2);

    let airport = report
        .branches
        .iter()
        .find(|row| row.branch_id.0 == "br-airport")
        .expect("airport row");
    assert_eq!(airport.scored, 0);
    assert_eq!(airport.average_compliance, None);

    let drafts = report
        .by_status
        .iter()
        .find(|entry| entry.status == AuditStatus::Draft)
        .expect("draft count");
    assert_eq!(drafts.count, 1);
}

#[test]
fn exports_branch_rows_as_csv() {
    let audits = vec![audit_with(AuditStatus::Submitted, all_answered())];
    let report = AnalyticsReport::build(&audits, &surveys());

    let mut buffer = Vec::new();
    report.write_csv(&mut buffer).expect("csv written");
    let text = String::from_utf8(buffer).expect("utf8");

    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("branch_id,audits,finished,scored,average_compliance")
    );
    assert_eq!(lines.next(), Some("br-downtown,1,1,1,100.00"));
}
