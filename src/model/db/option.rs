use std::ops::{Deref, DerefMut};

use mongodb::bson::{doc, DateTime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core data of one selectable option of a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOptionCore {
    pub question_id: Id,
    pub text: String,
    pub deleted: bool,
    pub deleted_at: Option<DateTime>,
}

impl QuestionOptionCore {
    pub fn new(question_id: Id, text: impl Into<String>) -> Self {
        Self {
            question_id,
            text: text.into(),
            deleted: false,
            deleted_at: None,
        }
    }

    /// Filter matching the live options of the given question.
    pub fn live_for(question_id: Id) -> Document {
        doc! { "question_id": question_id, "deleted": false }
    }

    /// Update that tombstones whatever it is applied to.
    pub fn tombstone() -> Document {
        doc! {
            "$set": { "deleted": true, "deleted_at": DateTime::now() }
        }
    }
}

/// An option without an ID.
pub type NewQuestionOption = QuestionOptionCore;

/// An option from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub option: QuestionOptionCore,
}

impl QuestionOption {
    /// A fresh live option with a newly generated ID.
    pub fn new(question_id: Id, text: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            option: QuestionOptionCore::new(question_id, text),
        }
    }
}

impl Deref for QuestionOption {
    type Target = QuestionOptionCore;

    fn deref(&self) -> &Self::Target {
        &self.option
    }
}

impl DerefMut for QuestionOption {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.option
    }
}
