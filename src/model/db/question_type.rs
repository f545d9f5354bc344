use std::ops::{Deref, DerefMut};

use mongodb::{bson::doc, error::Error as DbError};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::question_type::{QuestionKind, DEFAULT_QUESTION_TYPES},
    mongodb::{Coll, Id},
};

/// Core question type data. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTypeCore {
    pub name: String,
    pub kind: QuestionKind,
}

impl QuestionTypeCore {
    /// A new type, classified by its name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = QuestionKind::from_type_name(&name);
        Self { name, kind }
    }

    pub fn requires_options(&self) -> bool {
        self.kind.requires_options()
    }
}

/// A question type without an ID.
pub type NewQuestionType = QuestionTypeCore;

/// A question type from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionType {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub question_type: QuestionTypeCore,
}

impl Deref for QuestionType {
    type Target = QuestionTypeCore;

    fn deref(&self) -> &Self::Target {
        &self.question_type
    }
}

impl DerefMut for QuestionType {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.question_type
    }
}

/// Ensure every default question type exists, creating any that are missing.
///
/// This operation is idempotent.
pub async fn ensure_question_types_exist(types: &Coll<NewQuestionType>) -> Result<(), DbError> {
    for name in DEFAULT_QUESTION_TYPES {
        if types.find_one(doc! { "name": name }, None).await?.is_none() {
            debug!("Creating question type {name}");
            types.insert_one(NewQuestionType::new(name), None).await?;
        }
    }
    Ok(())
}
