//! Compliance scoring over an audit's raw responses.
//!
//! Scores are derived data: they are recomputed from responses and the survey
//! definition whenever they are needed and never stored alongside the audit.

use serde::{Deserialize, Serialize};

use super::domain::{QuestionKind, Responses, Survey, YesNo};

/// Yes-count over answered yes/no questions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplianceScore {
    pub yes_answers: u32,
    pub no_answers: u32,
    pub compliance_percentage: f64,
}

/// Points earned over points available across weighted yes/no questions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightedScore {
    pub weighted_earned_points: u32,
    pub weighted_possible_points: u32,
    pub weighted_compliance_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AuditScore {
    pub unweighted: ComplianceScore,
    pub weighted: WeightedScore,
}

/// Scores `responses` against `survey`. Missing or malformed answers count as unanswered.
pub fn score_audit(survey: &Survey, responses: &Responses) -> AuditScore {
    let mut yes_answers = 0u32;
    let mut no_answers = 0u32;
    let mut earned = 0u32;
    let mut possible = 0u32;

    for question in survey
        .questions()
        .filter(|question| question.kind == QuestionKind::YesNo)
    {
        let answer = responses.get(&question.id).and_then(YesNo::from_response);

        match answer {
            Some(YesNo::Yes) => yes_answers += 1,
            Some(YesNo::No) => no_answers += 1,
            Some(YesNo::Na) | None => {}
        }

        if let Some((side, weight)) = question.award() {
            possible = possible.saturating_add(weight);
            if answer == Some(side) {
                earned = earned.saturating_add(weight);
            }
        }
    }

    AuditScore {
        unweighted: ComplianceScore {
            yes_answers,
            no_answers,
            compliance_percentage: percentage(yes_answers, yes_answers + no_answers),
        },
        weighted: WeightedScore {
            weighted_earned_points: earned,
            weighted_possible_points: possible,
            weighted_compliance_percentage: percentage(earned, possible),
        },
    }
}

fn percentage(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        f64::from(numerator) / f64::from(denominator) * 100.0
    }
}

/// Which score a headline figure was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBasis {
    Weighted,
    Unweighted,
}

/// Score plus the headline figure a dashboard shows for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    #[serde(flatten)]
    pub score: AuditScore,
    pub basis: ScoreBasis,
    pub headline_percentage: f64,
}

impl ScoreSummary {
    /// Prefers the weighted score when any weighted points exist.
    pub fn headline(score: AuditScore) -> Self {
        let (basis, value) = if score.weighted.weighted_possible_points > 0 {
            (
                ScoreBasis::Weighted,
                score.weighted.weighted_compliance_percentage,
            )
        } else {
            (
                ScoreBasis::Unweighted,
                score.unweighted.compliance_percentage,
            )
        };

        Self {
            score,
            basis,
            headline_percentage: round2(value),
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
