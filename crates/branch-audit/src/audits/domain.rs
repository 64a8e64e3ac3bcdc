use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::access::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurveyId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuditId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId(pub String);

/// Where an audit was performed. Organizations, zones and branches live in the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub branch_id: BranchId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    YesNo,
    MultipleChoice,
    Checkbox,
    Number,
    Text,
    Date,
}

/// Reusable audit template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    pub sections: Vec<Section>,
}

impl Survey {
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions().find(|question| &question.id == id)
    }

    /// Template checks applied before a survey is stored.
    pub fn validate(&self) -> Result<(), SurveyError> {
        if self.title.trim().is_empty() {
            return Err(SurveyError::MissingTitle);
        }
        if self.sections.is_empty() {
            return Err(SurveyError::NoSections);
        }

        let mut section_ids = BTreeSet::new();
        let mut question_ids = BTreeSet::new();
        for section in &self.sections {
            if !section_ids.insert(&section.id) {
                return Err(SurveyError::DuplicateSection(section.id.clone()));
            }
            for question in &section.questions {
                if !question_ids.insert(&question.id) {
                    return Err(SurveyError::DuplicateQuestion(question.id.clone()));
                }
                question.validate()?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub yes_weight: u32,
    #[serde(default)]
    pub no_weight: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Question {
    /// Points available for this question; zero means the question is unweighted.
    pub fn max_weight(&self) -> u32 {
        self.yes_weight.max(self.no_weight)
    }

    /// Side of a yes/no question that earns points, with the points it earns.
    ///
    /// Templates normally weight at most one side. When both are set the larger side
    /// wins and ties go to `yes`.
    pub fn award(&self) -> Option<(YesNo, u32)> {
        if self.kind != QuestionKind::YesNo {
            return None;
        }
        match self.max_weight() {
            0 => None,
            weight if self.yes_weight >= self.no_weight => Some((YesNo::Yes, weight)),
            weight => Some((YesNo::No, weight)),
        }
    }

    fn validate(&self) -> Result<(), SurveyError> {
        match self.kind {
            QuestionKind::YesNo => {
                if self.yes_weight > 0 && self.no_weight > 0 {
                    return Err(SurveyError::ConflictingWeights(self.id.clone()));
                }
            }
            kind => {
                if self.max_weight() > 0 {
                    return Err(SurveyError::WeightOnNonYesNo(self.id.clone()));
                }
                if matches!(kind, QuestionKind::MultipleChoice | QuestionKind::Checkbox)
                    && self.options.is_empty()
                {
                    return Err(SurveyError::MissingOptions(self.id.clone()));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error("survey title is required")]
    MissingTitle,
    #[error("survey needs at least one section")]
    NoSections,
    #[error("section id {0:?} is used more than once")]
    DuplicateSection(SectionId),
    #[error("question id {0:?} is used more than once")]
    DuplicateQuestion(QuestionId),
    #[error("question {0:?} awards points for both yes and no")]
    ConflictingWeights(QuestionId),
    #[error("question {0:?} carries a weight but is not a yes/no question")]
    WeightOnNonYesNo(QuestionId),
    #[error("question {0:?} needs at least one option")]
    MissingOptions(QuestionId),
}

/// Interpreted answer to a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YesNo {
    Yes,
    No,
    Na,
}

impl YesNo {
    /// Reads a raw response. Anything that is not `yes`/`no`/`na` counts as unanswered.
    pub fn from_response(value: &Value) -> Option<Self> {
        let raw = value.as_str()?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "na" | "n/a" => Some(Self::Na),
            _ => None,
        }
    }
}

pub type Responses = BTreeMap<QuestionId, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Draft,
    InProgress,
    Completed,
    Submitted,
    Approved,
    Rejected,
}

impl AuditStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Draft,
            Self::InProgress,
            Self::Completed,
            Self::Submitted,
            Self::Approved,
            Self::Rejected,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Submitted => "Submitted",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub const fn accepts_responses(self) -> bool {
        matches!(self, Self::Draft | Self::InProgress)
    }

    /// Auditor has finished the audit and it has not been sent back.
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Submitted | Self::Approved)
    }
}

/// Uploaded evidence photo attached to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub question_id: QuestionId,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// Photo bytes waiting to be attached to an audit question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUpload {
    pub audit_id: AuditId,
    pub question_id: QuestionId,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl PhotoUpload {
    /// Builds an upload, guessing the content type from the file name.
    pub fn new(
        audit_id: AuditId,
        question_id: QuestionId,
        file_name: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<Self, PhotoError> {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name).first_or_octet_stream();
        let upload = Self {
            audit_id,
            question_id,
            file_name,
            content_type: content_type.essence_str().to_string(),
            data,
        };
        upload.check()?;
        Ok(upload)
    }

    pub fn check(&self) -> Result<(), PhotoError> {
        if self.data.is_empty() {
            return Err(PhotoError::Empty(self.file_name.clone()));
        }
        let parsed: mime::Mime = self
            .content_type
            .parse()
            .map_err(|_| PhotoError::NotAnImage(self.content_type.clone()))?;
        if parsed.type_() != mime::IMAGE {
            return Err(PhotoError::NotAnImage(self.content_type.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("photo {0} has no content")]
    Empty(String),
    #[error("{0} is not an image content type")]
    NotAnImage(String),
}

/// One audit of a branch against a survey template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub id: AuditId,
    pub survey_id: SurveyId,
    pub branch: BranchRef,
    pub auditor: UserId,
    pub status: AuditStatus,
    #[serde(default)]
    pub responses: Responses,
    #[serde(default)]
    pub na_reasons: BTreeMap<QuestionId, String>,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the repository on every stored update.
    #[serde(default)]
    pub revision: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn yes_no(id: &str, yes_weight: u32, no_weight: u32) -> Question {
        Question {
            id: QuestionId(id.to_string()),
            text: format!("Check {id}"),
            kind: QuestionKind::YesNo,
            required: true,
            yes_weight,
            no_weight,
            options: Vec::new(),
        }
    }

    fn survey(questions: Vec<Question>) -> Survey {
        Survey {
            id: SurveyId("s-1".to_string()),
            title: "Opening checklist".to_string(),
            sections: vec![Section {
                id: SectionId("front".to_string()),
                title: "Front of house".to_string(),
                questions,
            }],
        }
    }

    #[test]
    fn photo_content_type_is_guessed_from_name() {
        let upload = PhotoUpload::new(
            AuditId("aud-1".to_string()),
            QuestionId("q1".to_string()),
            "fire-exit.JPG",
            vec![0xFF, 0xD8],
        )
        .expect("jpeg accepted");
        assert_eq!(upload.content_type, "image/jpeg");

        let err = PhotoUpload::new(
            AuditId("aud-1".to_string()),
            QuestionId("q1".to_string()),
            "notes.txt",
            b"hello".to_vec(),
        )
        .expect_err("text rejected");
        assert!(matches!(err, PhotoError::NotAnImage(_)));
    }

    #[test]
    fn reads_yes_no_answers_loosely() {
        assert_eq!(YesNo::from_response(&json!(" YES ")), Some(YesNo::Yes));
        assert_eq!(YesNo::from_response(&json!("N/A")), Some(YesNo::Na));
        assert_eq!(YesNo::from_response(&json!(true)), None);
        assert_eq!(YesNo::from_response(&json!("maybe")), None);
    }

    #[test]
    fn award_side_follows_positive_weight() {
        assert_eq!(yes_no("q1", 10, 0).award(), Some((YesNo::Yes, 10)));
        assert_eq!(yes_no("q2", 0, 5).award(), Some((YesNo::No, 5)));
        assert_eq!(yes_no("q3", 0, 0).award(), None);
        assert_eq!(yes_no("q4", 3, 7).award(), Some((YesNo::No, 7)));
    }

    #[test]
    fn validation_rejects_double_sided_weights() {
        let err = survey(vec![yes_no("q1", 2, 2)])
            .validate()
            .expect_err("conflicting weights");
        assert!(matches!(err, SurveyError::ConflictingWeights(_)));
    }

    #[test]
    fn validation_rejects_duplicate_question_ids() {
        let err = survey(vec![yes_no("q1", 1, 0), yes_no("q1", 0, 0)])
            .validate()
            .expect_err("duplicate id");
        assert!(matches!(err, SurveyError::DuplicateQuestion(_)));
    }

    #[test]
    fn validation_requires_choice_options() {
        let mut question = yes_no("q1", 0, 0);
        question.kind = QuestionKind::MultipleChoice;
        let err = survey(vec![question]).validate().expect_err("options needed");
        assert!(matches!(err, SurveyError::MissingOptions(_)));
    }
}
