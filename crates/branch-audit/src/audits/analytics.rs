use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use super::domain::{Audit, AuditStatus, BranchId, Survey, SurveyId};
use super::scoring::{round2, score_audit, ScoreSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: AuditStatus,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchRow {
    pub branch_id: BranchId,
    pub audits: usize,
    pub finished: usize,
    pub scored: usize,
    pub average_compliance: Option<f64>,
}

/// Dashboard aggregates, recomputed from raw responses on every build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub total_audits: usize,
    pub completion_rate: f64,
    pub average_compliance: Option<f64>,
    pub by_status: Vec<StatusCount>,
    pub branches: Vec<BranchRow>,
}

#[derive(Default)]
struct BranchTally {
    audits: usize,
    finished: usize,
    headlines: Vec<f64>,
}

impl AnalyticsReport {
    pub fn build<'a>(
        audits: impl IntoIterator<Item = &'a Audit>,
        surveys: &BTreeMap<SurveyId, Survey>,
    ) -> Self {
        let mut by_status: BTreeMap<usize, usize> = BTreeMap::new();
        let mut branches: BTreeMap<BranchId, BranchTally> = BTreeMap::new();
        let mut headlines = Vec::new();
        let mut total = 0usize;
        let mut finished = 0usize;

        for audit in audits {
            total += 1;
            let status_index = AuditStatus::ordered()
                .iter()
                .position(|status| *status == audit.status)
                .unwrap_or_default();
            *by_status.entry(status_index).or_default() += 1;

            let tally = branches.entry(audit.branch.branch_id.clone()).or_default();
            tally.audits += 1;
            if audit.status.is_finished() {
                finished += 1;
                tally.finished += 1;
            }

            if audit.responses.is_empty() {
                continue;
            }
            if let Some(survey) = surveys.get(&audit.survey_id) {
                let summary = ScoreSummary::headline(score_audit(survey, &audit.responses));
                headlines.push(summary.headline_percentage);
                tally.headlines.push(summary.headline_percentage);
            }
        }

        let by_status = AuditStatus::ordered()
            .iter()
            .enumerate()
            .map(|(index, status)| StatusCount {
                status: *status,
                label: status.label(),
                count: by_status.get(&index).copied().unwrap_or(0),
            })
            .collect();

        let branches = branches
            .into_iter()
            .map(|(branch_id, tally)| BranchRow {
                branch_id,
                audits: tally.audits,
                finished: tally.finished,
                scored: tally.headlines.len(),
                average_compliance: average(&tally.headlines),
            })
            .collect();

        let completion_rate = if total == 0 {
            0.0
        } else {
            round2(finished as f64 / total as f64 * 100.0)
        };

        Self {
            total_audits: total,
            completion_rate,
            average_compliance: average(&headlines),
            by_status,
            branches,
        }
    }

    /// Writes one CSV row per branch.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "branch_id",
            "audits",
            "finished",
            "scored",
            "average_compliance",
        ])?;
        for row in &self.branches {
            csv.write_record([
                row.branch_id.0.clone(),
                row.audits.to_string(),
                row.finished.to_string(),
                row.scored.to_string(),
                row.average_compliance
                    .map(|value| format!("{value:.2}"))
                    .unwrap_or_default(),
            ])?;
        }
        csv.flush()?;
        Ok(())
    }
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(round2(values.iter().sum::<f64>() / values.len() as f64))
    }
}
