use std::collections::HashMap;

use mongodb::{
    bson::{doc, Bson, DateTime, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession, Database,
};
use rocket::{
    futures::TryStreamExt,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::question::{
        OptionSpec, OptionsField, QuestionDescription, QuestionFilter, QuestionPatch,
        QuestionSpec, QuestionTypeSpec, ReorderRequest,
    },
    db::{
        option::{QuestionOption, QuestionOptionCore},
        question::{Question, QuestionCore},
        question_type::{QuestionType, QuestionTypeCore},
    },
    mongodb::{is_duplicate_key_error, Coll, Counter, Id, QUESTION_POSITION_COUNTER_ID},
};

/// Owns every mutation of the form schema. Multi-step changes run in a
/// single transaction, so a question is never visible without its options.
pub struct QuestionManager {
    client: Client,
    types: Coll<QuestionType>,
    questions: Coll<Question>,
    options: Coll<QuestionOption>,
    counters: Coll<Counter>,
}

impl QuestionManager {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            types: Coll::from_db(db),
            questions: Coll::from_db(db),
            options: Coll::from_db(db),
            counters: Coll::from_db(db),
        }
    }

    /// All question types, by name.
    pub async fn types(&self) -> Result<Vec<QuestionType>> {
        let sort = FindOptions::builder().sort(doc! { "name": 1 }).build();
        Ok(self.types.find(None, sort).await?.try_collect().await?)
    }

    /// Register a new question type. Its kind is fixed by its name.
    pub async fn create_type(&self, spec: QuestionTypeSpec) -> Result<QuestionType> {
        spec.validate()?;
        let name = spec.name.trim();
        let question_type = QuestionType {
            id: Id::new(),
            question_type: QuestionTypeCore::new(name),
        };
        match self.types.insert_one(&question_type, None).await {
            Ok(_) => {
                info!("Created question type {name} ({:?})", question_type.kind);
                Ok(question_type)
            }
            Err(err) if is_duplicate_key_error(&err) => Err(Error::invalid(format!(
                "Question type {name} already exists"
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn question_type(&self, id: Id) -> Result<QuestionType> {
        self.types
            .find_one(id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::NotFound("Question type".to_string()))
    }

    async fn live_question(&self, id: Id) -> Result<Question> {
        self.questions
            .find_one(QuestionCore::live_with_id(id), None)
            .await?
            .ok_or_else(|| Error::NotFound("Question".to_string()))
    }

    async fn live_options(&self, question_id: Id) -> Result<Vec<QuestionOption>> {
        let sort = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        Ok(self
            .options
            .find(QuestionOptionCore::live_for(question_id), sort)
            .await?
            .try_collect()
            .await?)
    }

    /// A question with its type and live options.
    async fn describe(&self, question: Question) -> Result<QuestionDescription> {
        let question_type = self.question_type(question.type_id).await?;
        let options = self.live_options(question.id).await?;
        Ok(QuestionDescription::new(question, &question_type, options))
    }

    /// Get a live question.
    pub async fn get(&self, id: Id) -> Result<QuestionDescription> {
        let question = self.live_question(id).await?;
        self.describe(question).await
    }

    /// Live questions in form order, optionally filtered by type and active flag.
    pub async fn list(&self, filter: &QuestionFilter) -> Result<Vec<QuestionDescription>> {
        let mut query = QuestionCore::live();
        if let Some(type_id) = filter.type_id {
            query.insert("type_id", *type_id);
        }
        if let Some(active) = filter.active {
            query.insert("is_active", active);
        }
        let sort = FindOptions::builder().sort(doc! { "position": 1 }).build();
        let questions: Vec<Question> = self
            .questions
            .find(query, sort)
            .await?
            .try_collect()
            .await?;

        // Fetch all the types and options in one go.
        let types: HashMap<Id, QuestionType> = self
            .types
            .find(None, None)
            .await?
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .map(|question_type| (question_type.id, question_type))
            .collect();
        let ids: Vec<Id> = questions.iter().map(|question| question.id).collect();
        let option_filter = doc! { "question_id": { "$in": ids }, "deleted": false };
        let option_sort = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut options: HashMap<Id, Vec<QuestionOption>> = HashMap::new();
        let mut cursor = self.options.find(option_filter, option_sort).await?;
        while let Some(option) = cursor.try_next().await? {
            options.entry(option.question_id).or_default().push(option);
        }

        questions
            .into_iter()
            .map(|question| {
                let question_type = types
                    .get(&question.type_id)
                    .ok_or_else(|| Error::NotFound("Question type".to_string()))?;
                let options = options.remove(&question.id).unwrap_or_default();
                Ok(QuestionDescription::new(question, question_type, options))
            })
            .collect()
    }

    /// Create a question and its options, appended after every existing question.
    pub async fn create(&self, spec: QuestionSpec) -> Result<QuestionDescription> {
        spec.validate()?;
        let question_type = self.question_type(*spec.type_id).await?;

        let options = if question_type.requires_options() {
            let options = spec.options.into_options();
            if options.is_empty() {
                return Err(Error::invalid(format!(
                    "Questions of type {} need at least one option",
                    question_type.name
                )));
            }
            options
        } else {
            if let OptionsField::Explicit(options) = &spec.options {
                if !options.is_empty() {
                    debug!(
                        "Discarding {} options sent for a {} question",
                        options.len(),
                        question_type.name
                    );
                }
            }
            Vec::new()
        };

        let core = QuestionCore {
            text: spec.text.trim().to_string(),
            description: spec.description.filter(|description| !description.is_empty()),
            type_id: question_type.id,
            is_active: spec.is_active,
            is_required: spec.is_required,
            position: 0,
            deleted: false,
            deleted_at: None,
        };

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        let result = self.create_in(core, &options, &mut session).await;
        let (question, options) = finish(session, result).await?;

        info!(
            "Created question {} at position {}",
            question.id, question.position
        );
        Ok(QuestionDescription::new(question, &question_type, options))
    }

    async fn create_in(
        &self,
        mut core: QuestionCore,
        options: &[OptionSpec],
        session: &mut ClientSession,
    ) -> Result<(Question, Vec<QuestionOption>)> {
        core.position =
            Counter::next(&self.counters, QUESTION_POSITION_COUNTER_ID, session).await?;
        let question = Question {
            id: Id::new(),
            question: core,
        };
        self.questions
            .insert_one_with_session(&question, None, session)
            .await?;
        let options = self.replace_options_in(question.id, options, session).await?;
        Ok((question, options))
    }

    /// Tombstone every live option of the question, then insert the given ones.
    async fn replace_options_in(
        &self,
        question_id: Id,
        options: &[OptionSpec],
        session: &mut ClientSession,
    ) -> Result<Vec<QuestionOption>> {
        self.options
            .update_many_with_session(
                QuestionOptionCore::live_for(question_id),
                QuestionOptionCore::tombstone(),
                None,
                session,
            )
            .await?;

        let options: Vec<QuestionOption> = options
            .iter()
            .map(|option| QuestionOption::new(question_id, option.text.trim()))
            .collect();
        if !options.is_empty() {
            self.options
                .insert_many_with_session(&options, None, session)
                .await?;
        }
        Ok(options)
    }

    /// Partially update a question, then bring its options in line with its
    /// (possibly new) type.
    pub async fn update(&self, id: Id, patch: QuestionPatch) -> Result<QuestionDescription> {
        patch.validate()?;
        let question = self.live_question(id).await?;
        let question_type = match patch.type_id {
            Some(type_id) => self.question_type(*type_id).await?,
            None => self.question_type(question.type_id).await?,
        };
        if question_type.requires_options() {
            if let OptionsField::Explicit(options) = &patch.options {
                if options.is_empty() {
                    return Err(Error::invalid(format!(
                        "Questions of type {} need at least one option",
                        question_type.name
                    )));
                }
            }
        }

        let mut set = Document::new();
        if let Some(text) = &patch.text {
            set.insert("text", text.trim());
        }
        if let Some(description) = patch.new_description() {
            set.insert("description", description.map_or(Bson::Null, Bson::String));
        }
        if patch.type_id.is_some() {
            set.insert("type_id", question_type.id);
        }
        if let Some(is_active) = patch.is_active {
            set.insert("is_active", is_active);
        }
        if let Some(is_required) = patch.is_required {
            set.insert("is_required", is_required);
        }

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        let result = self
            .update_in(id, set, &question_type, patch.options, &mut session)
            .await;
        finish(session, result).await?;

        info!("Updated question {id}");
        self.get(id).await
    }

    async fn update_in(
        &self,
        id: Id,
        set: Document,
        question_type: &QuestionType,
        options: OptionsField,
        session: &mut ClientSession,
    ) -> Result<()> {
        // The question may have been deleted since it was read.
        self.questions
            .find_one_with_session(QuestionCore::live_with_id(id), None, session)
            .await?
            .ok_or_else(|| Error::NotFound("Question".to_string()))?;
        if !set.is_empty() {
            let result = self
                .questions
                .update_one_with_session(
                    QuestionCore::live_with_id(id),
                    doc! { "$set": set },
                    None,
                    session,
                )
                .await?;
            if result.matched_count == 0 {
                return Err(Error::NotFound("Question".to_string()));
            }
        }

        match (question_type.requires_options(), options) {
            (false, _) => {
                let result = self
                    .options
                    .update_many_with_session(
                        QuestionOptionCore::live_for(id),
                        QuestionOptionCore::tombstone(),
                        None,
                        session,
                    )
                    .await?;
                if result.modified_count > 0 {
                    debug!(
                        "Removed {} options from free-form question {id}",
                        result.modified_count
                    );
                }
            }
            (true, OptionsField::Explicit(options)) => {
                self.replace_options_in(id, &options, session).await?;
            }
            (true, OptionsField::Omitted) => {
                let live = self
                    .options
                    .count_documents_with_session(
                        QuestionOptionCore::live_for(id),
                        None,
                        session,
                    )
                    .await?;
                if live == 0 {
                    return Err(Error::invalid(format!(
                        "Questions of type {} need at least one option",
                        question_type.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Swap the positions of two live questions.
    pub async fn reorder(&self, request: ReorderRequest) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        let result = self
            .reorder_in(*request.source_id, *request.target_id, &mut session)
            .await;
        finish(session, result).await?;
        info!(
            "Swapped questions {} and {}",
            request.source_id, request.target_id
        );
        Ok(())
    }

    async fn reorder_in(
        &self,
        source_id: Id,
        target_id: Id,
        session: &mut ClientSession,
    ) -> Result<()> {
        let source = self
            .questions
            .find_one_with_session(QuestionCore::live_with_id(source_id), None, session)
            .await?
            .ok_or_else(|| Error::NotFound("Source question".to_string()))?;
        let target = self
            .questions
            .find_one_with_session(QuestionCore::live_with_id(target_id), None, session)
            .await?
            .ok_or_else(|| Error::NotFound("Target question".to_string()))?;

        for (id, position) in [(source.id, target.position), (target.id, source.position)] {
            self.questions
                .update_one_with_session(
                    id.as_doc(),
                    doc! { "$set": { "position": position } },
                    None,
                    session,
                )
                .await?;
        }
        Ok(())
    }

    /// Flip whether a question is shown on the public form.
    pub async fn toggle_active(&self, id: Id) -> Result<QuestionDescription> {
        self.toggle(id, "is_active").await
    }

    /// Flip whether a question must be answered.
    pub async fn toggle_required(&self, id: Id) -> Result<QuestionDescription> {
        self.toggle(id, "is_required").await
    }

    async fn toggle(&self, id: Id, field: &str) -> Result<QuestionDescription> {
        let mut negated = Document::new();
        negated.insert(field, doc! { "$not": [format!("${field}")] });
        let flip = vec![doc! { "$set": negated }];
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let question = self
            .questions
            .find_one_and_update(QuestionCore::live_with_id(id), flip, options)
            .await?
            .ok_or_else(|| Error::NotFound("Question".to_string()))?;
        self.describe(question).await
    }

    /// Soft delete a question. Answers referring to it still resolve.
    pub async fn delete(&self, id: Id) -> Result<()> {
        let tombstone = doc! {
            "$set": { "deleted": true, "deleted_at": DateTime::now() }
        };
        let result = self
            .questions
            .update_one(QuestionCore::live_with_id(id), tombstone, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::NotFound("Question".to_string()));
        }
        info!("Deleted question {id}");
        Ok(())
    }
}

/// Commit the transaction if the work inside it succeeded, or abort it.
pub(crate) async fn finish<T>(mut session: ClientSession, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            session
                .commit_transaction()
                .await
                .map_err(|err| Error::from(err).in_transaction())?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = session.abort_transaction().await {
                warn!("Failed to abort transaction: {abort_err}");
            }
            Err(err.in_transaction())
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for QuestionManager {
    type Error = ();

    /// Build a manager from the managed database connection.
    ///
    /// Panics iff the [`Client`] or [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let client = req.guard::<&State<Client>>().await.unwrap();
        let db = req.guard::<&State<Database>>().await.unwrap();
        Outcome::Success(Self::new(client.inner().clone(), db))
    }
}
