use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument},
    ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// The counter that hands out question positions.
pub const QUESTION_POSITION_COUNTER_ID: &str = "question_position";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: i64,
}

impl Counter {
    /// Create a new `Counter` with the given name, starting at the given value.
    pub fn new(id: impl Into<String>, start: i64) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the named counter as part of the
    /// session's transaction. If the transaction aborts, so does the increment.
    pub async fn next(
        counters: &Coll<Counter>,
        id: &str,
        session: &mut ClientSession,
    ) -> Result<i64> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update_with_session(doc! { "_id": id }, update, options, session)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Counter {id}")))?;
        Ok(counter.next)
    }
}

/// Ensure the question position counter exists, creating it if not.
///
/// This operation is idempotent.
pub async fn ensure_position_counter_exists(counters: &Coll<Counter>) -> Result<(), DbError> {
    let filter = doc! { "_id": QUESTION_POSITION_COUNTER_ID };
    if counters.find_one(filter, None).await?.is_none() {
        debug!("Creating question position counter");
        counters
            .insert_one(Counter::new(QUESTION_POSITION_COUNTER_ID, 1), None)
            .await?;
    }
    Ok(())
}
