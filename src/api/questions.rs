use rocket::{
    serde::json::{Error as JsonError, Json},
    Route,
};

use crate::error::{Error, Result};
use crate::form::QuestionManager;
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        question::{
            QuestionDescription, QuestionFilter, QuestionPatch, QuestionSpec,
            QuestionTypeDescription, QuestionTypeSpec, ReorderRequest,
        },
        response::ApiResponse,
    },
    mongodb::Id,
};

pub fn routes() -> Vec<Route> {
    routes![
        list_question_types,
        create_question_type,
        list_questions,
        get_question,
        create_question,
        update_question,
        delete_question,
        reorder_questions,
        toggle_active,
        toggle_required,
    ]
}

type Body<'r, T> = std::result::Result<Json<T>, JsonError<'r>>;

#[get("/form/question-types")]
async fn list_question_types(
    _token: AuthToken<Admin>,
    manager: QuestionManager,
) -> Result<ApiResponse<Vec<QuestionTypeDescription>>> {
    let types = manager.types().await?;
    Ok(ApiResponse::ok(
        types.into_iter().map(Into::into).collect(),
        "Question types retrieved",
    ))
}

#[post("/form/question-types", data = "<spec>", format = "json")]
async fn create_question_type(
    _token: AuthToken<Admin>,
    spec: Body<'_, QuestionTypeSpec>,
    manager: QuestionManager,
) -> Result<ApiResponse<QuestionTypeDescription>> {
    let spec = spec.map_err(Error::from)?.into_inner();
    let question_type = manager.create_type(spec).await?;
    Ok(ApiResponse::created(
        question_type.into(),
        "Question type created",
    ))
}

/// Admins see every question; everyone else sees the active ones.
/// Query values: `type_id` and `active`.
#[get("/form/questions")]
async fn list_questions(
    token: Option<AuthToken<Admin>>,
    filter: Result<QuestionFilter>,
    manager: QuestionManager,
) -> Result<ApiResponse<Vec<QuestionDescription>>> {
    let mut filter = filter?;
    if token.is_none() {
        filter.active = Some(true);
    }
    let questions = manager.list(&filter).await?;
    Ok(ApiResponse::ok(questions, "Questions retrieved"))
}

#[get("/form/questions/<question_id>")]
async fn get_question(
    _token: AuthToken<Admin>,
    question_id: Id,
    manager: QuestionManager,
) -> Result<ApiResponse<QuestionDescription>> {
    let question = manager.get(question_id).await?;
    Ok(ApiResponse::ok(question, "Question retrieved"))
}

#[post("/form/questions", data = "<spec>", format = "json")]
async fn create_question(
    _token: AuthToken<Admin>,
    spec: Body<'_, QuestionSpec>,
    manager: QuestionManager,
) -> Result<ApiResponse<QuestionDescription>> {
    let spec = spec.map_err(Error::from)?.into_inner();
    let question = manager.create(spec).await?;
    Ok(ApiResponse::created(question, "Question created"))
}

#[put("/form/questions/<question_id>", data = "<patch>", format = "json")]
async fn update_question(
    _token: AuthToken<Admin>,
    question_id: Id,
    patch: Body<'_, QuestionPatch>,
    manager: QuestionManager,
) -> Result<ApiResponse<QuestionDescription>> {
    let patch = patch.map_err(Error::from)?.into_inner();
    let question = manager.update(question_id, patch).await?;
    Ok(ApiResponse::ok(question, "Question updated"))
}

#[delete("/form/questions/<question_id>")]
async fn delete_question(
    _token: AuthToken<Admin>,
    question_id: Id,
    manager: QuestionManager,
) -> Result<ApiResponse<()>> {
    manager.delete(question_id).await?;
    Ok(ApiResponse::message("Question deleted"))
}

#[patch("/form/questions/reorder", data = "<request>", format = "json")]
async fn reorder_questions(
    _token: AuthToken<Admin>,
    request: Body<'_, ReorderRequest>,
    manager: QuestionManager,
) -> Result<ApiResponse<()>> {
    let request = request.map_err(Error::from)?.into_inner();
    manager.reorder(request).await?;
    Ok(ApiResponse::message("Questions reordered"))
}

#[patch("/form/questions/<question_id>/active")]
async fn toggle_active(
    _token: AuthToken<Admin>,
    question_id: Id,
    manager: QuestionManager,
) -> Result<ApiResponse<QuestionDescription>> {
    let question = manager.toggle_active(question_id).await?;
    Ok(ApiResponse::ok(question, "Question active state changed"))
}

#[patch("/form/questions/<question_id>/required")]
async fn toggle_required(
    _token: AuthToken<Admin>,
    question_id: Id,
    manager: QuestionManager,
) -> Result<ApiResponse<QuestionDescription>> {
    let question = manager.toggle_required(question_id).await?;
    Ok(ApiResponse::ok(question, "Question required state changed"))
}

#[cfg(test)]
mod tests {
    use mongodb::{bson::doc, Database};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::api::test_support::{
        create_question as create, envelope_of, post_question, put_question, type_id,
    };
    use crate::model::{
        api::{id::ApiId, question::OptionsField},
        common::question_type::QuestionKind,
        db::{
            option::{QuestionOption, QuestionOptionCore},
            question::Question,
        },
        mongodb::Coll,
    };

    use super::*;

    /// Option texts of the live options of a question, straight from the database.
    async fn live_options(db: &Database, question_id: ApiId) -> Vec<String> {
        let options = Coll::<QuestionOption>::from_db(db);
        let mut texts = Vec::new();
        let mut cursor = options
            .find(QuestionOptionCore::live_for(*question_id), None)
            .await
            .unwrap();
        while cursor.advance().await.unwrap() {
            texts.push(cursor.deserialize_current().unwrap().option.text);
        }
        texts
    }

    async fn get(client: &Client, id: ApiId) -> QuestionDescription {
        let response = client
            .get(format!("/api/form/questions/{id}"))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        envelope_of::<QuestionDescription>(response)
            .await
            .data
            .unwrap()
    }

    async fn reorder(client: &Client, source: ApiId, target: ApiId) -> Status {
        client
            .patch(uri!("/api", reorder_questions))
            .header(ContentType::JSON)
            .body(json!({ "sourceId": source, "targetId": target }).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test(admin)]
    async fn choice_question_becomes_free_form(client: Client, db: Database) {
        let multiple = type_id(&db, "multiple").await;
        let question = create(&client, QuestionSpec::example(multiple)).await;
        assert_eq!(question.kind, QuestionKind::ChoiceBearing);
        assert_eq!(question.type_name, "multiple");
        assert_eq!(question.options.len(), 2);
        assert_eq!(live_options(&db, question.id).await, vec!["Red", "Blue"]);

        // Switch to a free-form type without mentioning options.
        let text = type_id(&db, "text").await;
        let response = put_question(&client, question.id, &json!({ "typeId": text })).await;
        assert_eq!(Status::Ok, response.status());
        let updated = envelope_of::<QuestionDescription>(response)
            .await
            .data
            .unwrap();
        assert_eq!(updated.type_id, text);
        assert!(updated.options.is_empty());
        assert!(live_options(&db, question.id).await.is_empty());

        // The options are tombstoned, not removed.
        let all = Coll::<QuestionOption>::from_db(&db)
            .count_documents(doc! { "question_id": *question.id, "deleted": true }, None)
            .await
            .unwrap();
        assert_eq!(all, 2);

        let stored = Coll::<Question>::from_db(&db)
            .find_one(question.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.type_id, *text);
    }

    #[backend_test(admin)]
    async fn choice_question_needs_options(client: Client, db: Database) {
        let dropdown = type_id(&db, "dropdown").await;

        let mut spec = QuestionSpec::example(dropdown);
        spec.options = OptionsField::Omitted;
        let response = post_question(&client, &json!(spec)).await;
        assert_eq!(Status::BadRequest, response.status());

        spec.options = OptionsField::Explicit(vec![]);
        let response = post_question(&client, &json!(spec)).await;
        assert_eq!(Status::BadRequest, response.status());
        let envelope = envelope_of::<()>(response).await;
        assert!(!envelope.success);
        assert_eq!(envelope.message, "Invalid request");
        assert_eq!(envelope.errors.len(), 1);

        let count = Coll::<Question>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[backend_test(admin)]
    async fn free_form_question_has_no_options(client: Client, db: Database) {
        let text = type_id(&db, "text").await;

        // Options sent for a free-form type are discarded.
        let mut spec = QuestionSpec::example(text);
        let question = create(&client, &spec).await;
        assert!(question.options.is_empty());
        assert!(live_options(&db, question.id).await.is_empty());

        // An explicit empty list is fine too.
        spec.options = OptionsField::Explicit(vec![]);
        let question = create(&client, &spec).await;
        assert!(question.options.is_empty());
        assert_eq!(question.kind, QuestionKind::FreeForm);

        // Clearing the options of a free-form question is a no-op, not an error.
        let response = put_question(&client, question.id, &json!({ "options": [] })).await;
        assert_eq!(Status::Ok, response.status());
        let updated = envelope_of::<QuestionDescription>(response)
            .await
            .data
            .unwrap();
        assert!(updated.options.is_empty());
        assert!(live_options(&db, question.id).await.is_empty());
    }

    #[backend_test(admin)]
    async fn update_replaces_options(client: Client, db: Database) {
        let multiple = type_id(&db, "multiple").await;
        let question = create(&client, QuestionSpec::example(multiple)).await;

        let response = put_question(
            &client,
            question.id,
            &json!({ "options": [{ "option": "Green" }, { "option": "Red" }] }),
        )
        .await;
        assert_eq!(Status::Ok, response.status());
        let updated = envelope_of::<QuestionDescription>(response)
            .await
            .data
            .unwrap();
        let texts: Vec<_> = updated.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["Green", "Red"]);
        // Every option is new, even the one with unchanged text.
        assert!(updated
            .options
            .iter()
            .all(|option| !question.options.contains(option)));
        assert_eq!(live_options(&db, question.id).await, vec!["Green", "Red"]);
    }

    #[backend_test(admin)]
    async fn omitted_options_are_kept(client: Client, db: Database) {
        let multiple = type_id(&db, "multiple").await;
        let question = create(&client, QuestionSpec::example(multiple)).await;

        // Omitted: untouched.
        let response =
            put_question(&client, question.id, &json!({ "question": "Favourite colour?" })).await;
        assert_eq!(Status::Ok, response.status());
        let updated = envelope_of::<QuestionDescription>(response)
            .await
            .data
            .unwrap();
        assert_eq!(updated.text, "Favourite colour?");
        assert_eq!(updated.options, question.options);

        // Explicitly empty: rejected, nothing changes.
        for body in [json!({ "options": [] }), json!({ "options": null })] {
            let response = put_question(&client, question.id, &body).await;
            assert_eq!(Status::BadRequest, response.status());
        }
        assert_eq!(get(&client, question.id).await.options, question.options);
    }

    #[backend_test(admin)]
    async fn free_form_to_choice(client: Client, db: Database) {
        let text = type_id(&db, "text").await;
        let unique = type_id(&db, "unique").await;
        let question = create(&client, QuestionSpec::free_form(text)).await;

        // Without options the question would break the invariant.
        let response = put_question(&client, question.id, &json!({ "typeId": unique })).await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(get(&client, question.id).await.type_id, text);

        let response = put_question(
            &client,
            question.id,
            &json!({ "typeId": unique, "options": [{ "option": "Yes" }, { "option": "No" }] }),
        )
        .await;
        assert_eq!(Status::Ok, response.status());
        let updated = get(&client, question.id).await;
        assert_eq!(updated.type_id, unique);
        assert_eq!(updated.options.len(), 2);
    }

    #[backend_test(admin)]
    async fn create_is_atomic(client: Client, db: Database) {
        let multiple = type_id(&db, "multiple").await;

        // Duplicate option texts violate the unique index after the question
        // itself has been inserted.
        let response = post_question(
            &client,
            &json!({
                "question": "Favorite color?",
                "typeId": multiple,
                "options": [{ "option": "Red" }, { "option": "Red" }],
            }),
        )
        .await;
        assert_eq!(Status::BadRequest, response.status());

        let questions = Coll::<Question>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(questions, 0);
        let options = Coll::<QuestionOption>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(options, 0);

        // The position drawn by the failed attempt was rolled back too.
        let question = create(&client, QuestionSpec::example(multiple)).await;
        assert_eq!(question.position, 1);
    }

    #[backend_test(admin)]
    async fn questions_are_appended_and_listed_in_order(client: Client, db: Database) {
        let text = type_id(&db, "text").await;
        let multiple = type_id(&db, "multiple").await;
        let first = create(&client, QuestionSpec::free_form(text)).await;
        let second = create(&client, QuestionSpec::example(multiple)).await;
        let third = create(&client, QuestionSpec::free_form(text)).await;
        assert!(first.position < second.position && second.position < third.position);

        let response = client.get("/api/form/questions").dispatch().await;
        let listed = envelope_of::<Vec<QuestionDescription>>(response)
            .await
            .data
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
        assert_eq!(listed[1].options, second.options);

        // Filter by type.
        let response = client
            .get(format!("/api/form/questions?type_id={text}"))
            .dispatch()
            .await;
        let listed = envelope_of::<Vec<QuestionDescription>>(response)
            .await
            .data
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[backend_test(admin)]
    async fn malformed_filters_are_rejected(client: Client, db: Database) {
        let text = type_id(&db, "text").await;
        create(&client, QuestionSpec::free_form(text)).await;

        for (query, field) in [("?type_id=zzz", "type_id"), ("?active=maybe", "active")] {
            let response = client
                .get(format!("/api/form/questions{query}"))
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status(), "{query}");
            let envelope = envelope_of::<()>(response).await;
            assert!(
                envelope.errors.iter().any(|error| error.contains(field)),
                "{:?}",
                envelope.errors
            );
        }

        // Well-formed values still filter.
        let response = client
            .get(format!("/api/form/questions?type_id={text}&active=true"))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    #[backend_test(admin)]
    async fn reorder_swaps_positions(client: Client, db: Database) {
        let text = type_id(&db, "text").await;
        let a = create(&client, QuestionSpec::free_form(text)).await;
        let b = create(&client, QuestionSpec::free_form(text)).await;

        assert_eq!(Status::Ok, reorder(&client, a.id, b.id).await);
        assert_eq!(get(&client, a.id).await.position, b.position);
        assert_eq!(get(&client, b.id).await.position, a.position);

        // Swapping back restores the original order.
        assert_eq!(Status::Ok, reorder(&client, a.id, b.id).await);
        assert_eq!(get(&client, a.id).await.position, a.position);
        assert_eq!(get(&client, b.id).await.position, b.position);

        let missing = ApiId::from(Id::new());
        assert_eq!(Status::NotFound, reorder(&client, a.id, missing).await);
        assert_eq!(Status::NotFound, reorder(&client, missing, b.id).await);
        assert_eq!(get(&client, a.id).await.position, a.position);
    }

    #[backend_test(admin)]
    async fn toggles(client: Client, db: Database) {
        let text = type_id(&db, "text").await;
        let question = create(&client, QuestionSpec::free_form(text)).await;
        assert!(question.is_active);
        assert!(!question.is_required);

        let response = client
            .patch(format!("/api/form/questions/{}/active", question.id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let toggled = envelope_of::<QuestionDescription>(response)
            .await
            .data
            .unwrap();
        assert!(!toggled.is_active);

        let response = client
            .patch(format!("/api/form/questions/{}/required", question.id))
            .dispatch()
            .await;
        let toggled = envelope_of::<QuestionDescription>(response)
            .await
            .data
            .unwrap();
        assert!(toggled.is_required);
        assert!(!toggled.is_active);

        // Admins can still list inactive questions, or filter them out.
        let response = client.get("/api/form/questions").dispatch().await;
        let listed = envelope_of::<Vec<QuestionDescription>>(response)
            .await
            .data
            .unwrap();
        assert_eq!(listed.len(), 1);
        let response = client
            .get("/api/form/questions?active=true")
            .dispatch()
            .await;
        let listed = envelope_of::<Vec<QuestionDescription>>(response)
            .await
            .data
            .unwrap();
        assert!(listed.is_empty());

        let response = client
            .patch(format!("/api/form/questions/{}/active", ApiId::from(Id::new())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn public_listing_shows_active_questions(client: Client, db: Database) {
        let text = type_id(&db, "text").await;
        let shown = create(&client, QuestionSpec::free_form(text)).await;
        let hidden = create(&client, QuestionSpec::free_form(text)).await;
        client
            .patch(format!("/api/form/questions/{}/active", hidden.id))
            .dispatch()
            .await;

        client.delete("/api/auth").dispatch().await;
        let response = client
            .get("/api/form/questions?active=false")
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let listed = envelope_of::<Vec<QuestionDescription>>(response)
            .await
            .data
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![shown.id]);

        // Everything else stays admin-only.
        let response = client
            .get(format!("/api/form/questions/{}", shown.id))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(admin)]
    async fn delete_is_soft(client: Client, db: Database) {
        let text = type_id(&db, "text").await;
        let question = create(&client, QuestionSpec::free_form(text)).await;
        let uri = format!("/api/form/questions/{}", question.id);

        let response = client.delete(uri.as_str()).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let response = client.get(uri.as_str()).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let envelope = envelope_of::<()>(response).await;
        assert_eq!(envelope.message, "Question not found");

        let response = client.delete(uri.as_str()).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let response = put_question(&client, question.id, &json!({ "question": "Back?" })).await;
        assert_eq!(Status::NotFound, response.status());

        let stored = Coll::<Question>::from_db(&db)
            .find_one(question.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.deleted);
        assert!(stored.deleted_at.is_some());
    }

    #[backend_test(admin)]
    async fn description_can_be_cleared(client: Client, db: Database) {
        let multiple = type_id(&db, "multiple").await;
        let question = create(&client, QuestionSpec::example(multiple)).await;
        assert_eq!(question.description.as_deref(), Some("Pick any"));

        // Absent: untouched.
        let response = put_question(&client, question.id, &json!({ "isRequired": false })).await;
        let updated = envelope_of::<QuestionDescription>(response)
            .await
            .data
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Pick any"));
        assert!(!updated.is_required);

        let response = put_question(&client, question.id, &json!({ "description": null })).await;
        let updated = envelope_of::<QuestionDescription>(response)
            .await
            .data
            .unwrap();
        assert_eq!(updated.description, None);
    }

    #[backend_test(admin)]
    async fn invalid_questions(client: Client, db: Database) {
        let text = type_id(&db, "text").await;

        let response = post_question(
            &client,
            &json!({ "question": "x".repeat(51), "typeId": text }),
        )
        .await;
        assert_eq!(Status::BadRequest, response.status());

        // Unknown type.
        let response = post_question(
            &client,
            &json!({ "question": "Anything?", "typeId": ApiId::from(Id::new()) }),
        )
        .await;
        assert_eq!(Status::NotFound, response.status());
        let envelope = envelope_of::<()>(response).await;
        assert_eq!(envelope.message, "Question type not found");

        // Malformed body.
        let response = client
            .post("/api/form/questions")
            .header(ContentType::JSON)
            .body("{\"question\": 5}")
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test(admin)]
    async fn question_types(client: Client) {
        let response = client.get(uri!("/api", list_question_types)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let types = envelope_of::<Vec<QuestionTypeDescription>>(response)
            .await
            .data
            .unwrap();
        let dropdown = types.iter().find(|t| t.name == "dropdown").unwrap();
        assert!(dropdown.requires_options);
        let date = types.iter().find(|t| t.name == "date").unwrap();
        assert!(!date.requires_options);

        let response = client
            .post(uri!("/api", create_question_type))
            .header(ContentType::JSON)
            .body(json!({ "type": "rating" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        let created = envelope_of::<QuestionTypeDescription>(response)
            .await
            .data
            .unwrap();
        assert_eq!(created.name, "rating");
        assert!(!created.requires_options);

        for name in ["rating", "multiple", ""] {
            let response = client
                .post(uri!("/api", create_question_type))
                .header(ContentType::JSON)
                .body(json!({ "type": name }).to_string())
                .dispatch()
                .await;
            assert_eq!(Status::BadRequest, response.status(), "{name:?}");
        }
    }
}
