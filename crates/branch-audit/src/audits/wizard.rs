use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use super::domain::{Audit, Question, QuestionId, QuestionKind, Section, SectionId, Survey, YesNo};

/// Per-section completion state for the audit wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionProgress {
    pub section_id: SectionId,
    pub title: String,
    pub answered: usize,
    pub total: usize,
    pub missing_required: Vec<QuestionId>,
    pub missing_na_reasons: Vec<QuestionId>,
    pub invalid_answers: Vec<QuestionId>,
}

impl SectionProgress {
    pub fn is_complete(&self) -> bool {
        self.missing_required.is_empty()
            && self.missing_na_reasons.is_empty()
            && self.invalid_answers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardProgress {
    pub sections: Vec<SectionProgress>,
    pub answered: usize,
    pub total: usize,
    pub complete: bool,
}

impl WizardProgress {
    /// Index of the first section that still blocks completion.
    pub fn first_incomplete(&self) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| !section.is_complete())
    }
}

pub fn evaluate(survey: &Survey, audit: &Audit) -> WizardProgress {
    let sections: Vec<SectionProgress> = survey
        .sections
        .iter()
        .map(|section| section_progress(section, audit))
        .collect();

    let answered = sections.iter().map(|section| section.answered).sum();
    let total = sections.iter().map(|section| section.total).sum();
    let complete = sections.iter().all(SectionProgress::is_complete);

    WizardProgress {
        sections,
        answered,
        total,
        complete,
    }
}

fn section_progress(section: &Section, audit: &Audit) -> SectionProgress {
    let mut progress = SectionProgress {
        section_id: section.id.clone(),
        title: section.title.clone(),
        answered: 0,
        total: section.questions.len(),
        missing_required: Vec::new(),
        missing_na_reasons: Vec::new(),
        invalid_answers: Vec::new(),
    };

    for question in &section.questions {
        match audit.responses.get(&question.id) {
            None | Some(Value::Null) => {
                if question.required {
                    progress.missing_required.push(question.id.clone());
                }
            }
            Some(value) => match check_answer(question, value) {
                AnswerCheck::Valid => progress.answered += 1,
                AnswerCheck::NotApplicable => {
                    progress.answered += 1;
                    let justified = audit
                        .na_reasons
                        .get(&question.id)
                        .is_some_and(|reason| !reason.trim().is_empty());
                    if !justified {
                        progress.missing_na_reasons.push(question.id.clone());
                    }
                }
                AnswerCheck::Blank => {
                    if question.required {
                        progress.missing_required.push(question.id.clone());
                    }
                }
                AnswerCheck::Invalid => progress.invalid_answers.push(question.id.clone()),
            },
        }
    }

    progress
}

enum AnswerCheck {
    Valid,
    NotApplicable,
    Blank,
    Invalid,
}

fn check_answer(question: &Question, value: &Value) -> AnswerCheck {
    match question.kind {
        QuestionKind::YesNo => match YesNo::from_response(value) {
            Some(YesNo::Na) => AnswerCheck::NotApplicable,
            Some(_) => AnswerCheck::Valid,
            None if is_blank(value) => AnswerCheck::Blank,
            None => AnswerCheck::Invalid,
        },
        QuestionKind::MultipleChoice => match value.as_str() {
            Some(raw) if raw.trim().is_empty() => AnswerCheck::Blank,
            Some(raw) if question.options.iter().any(|option| option == raw) => AnswerCheck::Valid,
            _ => AnswerCheck::Invalid,
        },
        QuestionKind::Checkbox => match value.as_array() {
            Some(items) if items.is_empty() => AnswerCheck::Blank,
            Some(items) => {
                let known = items.iter().all(|item| {
                    item.as_str()
                        .is_some_and(|raw| question.options.iter().any(|option| option == raw))
                });
                if known {
                    AnswerCheck::Valid
                } else {
                    AnswerCheck::Invalid
                }
            }
            None => AnswerCheck::Invalid,
        },
        QuestionKind::Number => match value {
            Value::Number(_) => AnswerCheck::Valid,
            Value::String(raw) if raw.trim().is_empty() => AnswerCheck::Blank,
            Value::String(raw) if raw.trim().parse::<f64>().is_ok() => AnswerCheck::Valid,
            _ => AnswerCheck::Invalid,
        },
        QuestionKind::Text => match value.as_str() {
            Some(raw) if raw.trim().is_empty() => AnswerCheck::Blank,
            Some(_) => AnswerCheck::Valid,
            None => AnswerCheck::Invalid,
        },
        QuestionKind::Date => match value.as_str() {
            Some(raw) if raw.trim().is_empty() => AnswerCheck::Blank,
            Some(raw) if NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").is_ok() => {
                AnswerCheck::Valid
            }
            _ => AnswerCheck::Invalid,
        },
    }
}

fn is_blank(value: &Value) -> bool {
    value.as_str().is_some_and(|raw| raw.trim().is_empty())
}
