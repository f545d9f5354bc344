use chrono::{DateTime, Utc};
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{id::ApiId, query::StrictQuery},
    common::submission::SubmissionStatus,
};

pub const MAX_ANSWER_LENGTH: usize = 255;

/// One answer in a new submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSpec {
    pub question_id: ApiId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub option_ids: Vec<ApiId>,
}

/// A new submission: one batch of answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSpec {
    pub answers: Vec<AnswerSpec>,
}

impl SubmissionSpec {
    /// Check the shape of the submission. Whether the questions exist is
    /// checked against the database later.
    pub fn validate(&self) -> Result<()> {
        if self.answers.is_empty() {
            return Err(Error::invalid("At least one answer is required"));
        }
        let errors: Vec<_> = self
            .answers
            .iter()
            .enumerate()
            .filter(|(_, answer)| {
                answer
                    .answer
                    .as_ref()
                    .map_or(false, |text| text.chars().count() > MAX_ANSWER_LENGTH)
            })
            .map(|(i, _)| {
                format!(
                    "Answer {} must be at most {MAX_ANSWER_LENGTH} characters",
                    i + 1
                )
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }
}

/// A selected option, resolved to its text at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOption {
    pub id: ApiId,
    pub option_text: String,
}

/// An answer resolved against the (possibly since changed) schema.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDescription {
    pub id: ApiId,
    pub question_id: ApiId,
    pub question: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub answer: Option<String>,
    pub options: Vec<SelectedOption>,
}

/// A submission with its resolved answers.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDescription {
    pub id: ApiId,
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
    pub answers: Vec<AnswerDescription>,
}

/// Filters for listing submissions, read from the `status` query value.
#[derive(Debug, Default)]
pub struct SubmissionFilter {
    pub status: Option<SubmissionStatus>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SubmissionFilter {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let mut query = StrictQuery::new(req);
        let filter = Self {
            status: query.get("status"),
        };
        query.finish(filter)
    }
}

/// A request to overwrite a submission's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: SubmissionStatus,
}
