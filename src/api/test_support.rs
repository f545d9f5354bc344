//! Helpers shared by the route tests.

use mongodb::{bson::doc, Database};
use rocket::{
    http::{ContentType, Status},
    local::asynchronous::{Client, LocalResponse},
    serde::json::{serde_json, Value},
};
use serde::de::DeserializeOwned;

use crate::model::{
    api::{id::ApiId, question::QuestionDescription, response::ApiResponse},
    db::question_type::QuestionType,
    mongodb::Coll,
};

/// Parse a response body as an envelope.
pub async fn envelope_of<T>(response: LocalResponse<'_>) -> ApiResponse<T>
where
    T: DeserializeOwned + Send + 'static,
{
    response
        .into_json()
        .await
        .expect("body should be an envelope")
}

/// The ID of a seeded question type.
pub async fn type_id(db: &Database, name: &str) -> ApiId {
    Coll::<QuestionType>::from_db(db)
        .find_one(doc! { "name": name }, None)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("no question type {name}"))
        .id
        .into()
}

/// POST a question body.
pub async fn post_question<'c>(client: &'c Client, body: &Value) -> LocalResponse<'c> {
    client
        .post("/api/form/questions")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .await
}

/// PUT a question patch.
pub async fn put_question<'c>(client: &'c Client, id: ApiId, body: &Value) -> LocalResponse<'c> {
    client
        .put(format!("/api/form/questions/{id}"))
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .await
}

/// Create a question, expecting success.
pub async fn create_question(client: &Client, body: impl serde::Serialize) -> QuestionDescription {
    let body = serde_json::to_value(body).unwrap();
    let response = post_question(client, &body).await;
    assert_eq!(Status::Created, response.status());
    envelope_of::<QuestionDescription>(response)
        .await
        .data
        .unwrap()
}
