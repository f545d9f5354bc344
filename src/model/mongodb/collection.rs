use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    answer::{Answer, NewAnswer},
    option::{NewQuestionOption, QuestionOption},
    question::{NewQuestion, Question},
    question_type::{NewQuestionType, QuestionType},
    submission::{NewSubmission, Submission},
    user::{NewUser, User},
};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Staff collections
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}
impl MongoCollection for NewUser {
    const NAME: &'static str = USERS;
}

// Question type collections
const QUESTION_TYPES: &str = "question_types";
impl MongoCollection for QuestionType {
    const NAME: &'static str = QUESTION_TYPES;
}
impl MongoCollection for NewQuestionType {
    const NAME: &'static str = QUESTION_TYPES;
}

// Question collections
const QUESTIONS: &str = "questions";
impl MongoCollection for Question {
    const NAME: &'static str = QUESTIONS;
}
impl MongoCollection for NewQuestion {
    const NAME: &'static str = QUESTIONS;
}

// Option collections
const QUESTION_OPTIONS: &str = "question_options";
impl MongoCollection for QuestionOption {
    const NAME: &'static str = QUESTION_OPTIONS;
}
impl MongoCollection for NewQuestionOption {
    const NAME: &'static str = QUESTION_OPTIONS;
}

// Submission collections
const SUBMISSIONS: &str = "submissions";
impl MongoCollection for Submission {
    const NAME: &'static str = SUBMISSIONS;
}
impl MongoCollection for NewSubmission {
    const NAME: &'static str = SUBMISSIONS;
}

// Answer collections
const ANSWERS: &str = "answers";
impl MongoCollection for Answer {
    const NAME: &'static str = ANSWERS;
}
impl MongoCollection for NewAnswer {
    const NAME: &'static str = ANSWERS;
}

// Counter collection
const COUNTERS: &str = "counters";
impl MongoCollection for Counter {
    const NAME: &'static str = COUNTERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // User collection.
    let user_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // Question type collection.
    let type_index = IndexModel::builder()
        .keys(doc! {"name": 1})
        .options(unique)
        .build();
    Coll::<QuestionType>::from_db(db)
        .create_index(type_index, None)
        .await?;

    // Question collection, listed by position.
    let question_index = IndexModel::builder()
        .keys(doc! {"deleted": 1, "position": 1})
        .build();
    Coll::<Question>::from_db(db)
        .create_index(question_index, None)
        .await?;

    // Option collection: live option texts are unique within their question.
    let live_unique = IndexOptions::builder()
        .unique(true)
        .partial_filter_expression(doc! {"deleted": false})
        .build();
    let option_index = IndexModel::builder()
        .keys(doc! {"question_id": 1, "text": 1})
        .options(live_unique)
        .build();
    Coll::<QuestionOption>::from_db(db)
        .create_index(option_index, None)
        .await?;

    // Submission collection, listed newest first.
    let submission_index = IndexModel::builder()
        .keys(doc! {"status": 1, "submitted_at": -1})
        .build();
    Coll::<Submission>::from_db(db)
        .create_index(submission_index, None)
        .await?;

    // Answer collection, read back per submission.
    let answer_index = IndexModel::builder()
        .keys(doc! {"submission_id": 1})
        .build();
    Coll::<Answer>::from_db(db)
        .create_index(answer_index, None)
        .await?;

    Ok(())
}
