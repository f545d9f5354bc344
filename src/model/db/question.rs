use std::ops::{Deref, DerefMut};

use mongodb::bson::{doc, DateTime, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core question data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionCore {
    pub text: String,
    pub description: Option<String>,
    pub type_id: Id,
    pub is_active: bool,
    pub is_required: bool,
    /// Sort key among live questions. Unique, but not necessarily contiguous.
    pub position: i64,
    pub deleted: bool,
    pub deleted_at: Option<DateTime>,
}

impl QuestionCore {
    /// Filter matching every question that has not been deleted.
    pub fn live() -> Document {
        doc! { "deleted": false }
    }

    /// Filter matching the question with the given ID, if it has not been deleted.
    pub fn live_with_id(id: Id) -> Document {
        doc! { "_id": id, "deleted": false }
    }
}

/// A question without an ID.
pub type NewQuestion = QuestionCore;

/// A question from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub question: QuestionCore,
}

impl Deref for Question {
    type Target = QuestionCore;

    fn deref(&self) -> &Self::Target {
        &self.question
    }
}

impl DerefMut for Question {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.question
    }
}
