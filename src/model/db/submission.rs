use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::submission::SubmissionStatus, mongodb::Id};

/// Core submission data. Only `status` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCore {
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
}

impl SubmissionCore {
    /// A pending submission, submitted now.
    pub fn new() -> Self {
        Self {
            submitted_at: Utc::now(),
            status: SubmissionStatus::Pending,
        }
    }
}

impl Default for SubmissionCore {
    fn default() -> Self {
        Self::new()
    }
}

/// A submission without an ID.
pub type NewSubmission = SubmissionCore;

/// A submission from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub submission: SubmissionCore,
}

impl Deref for Submission {
    type Target = SubmissionCore;

    fn deref(&self) -> &Self::Target {
        &self.submission
    }
}

impl DerefMut for Submission {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.submission
    }
}
