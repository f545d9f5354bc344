use std::collections::{HashMap, HashSet};

use mongodb::{
    bson::{doc, Document},
    options::FindOptions,
    Client, ClientSession, Database,
};
use rocket::{
    futures::TryStreamExt,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        id::ApiId,
        pagination::{Paginated, Pagination},
        submission::{
            AnswerDescription, AnswerSpec, SelectedOption, SubmissionDescription, SubmissionSpec,
        },
    },
    common::submission::SubmissionStatus,
    db::{
        answer::{Answer, AnswerCore},
        option::QuestionOption,
        question::{Question, QuestionCore},
        question_type::QuestionType,
        submission::{Submission, SubmissionCore},
    },
    mongodb::{Coll, Id},
};

use super::questions::finish;

/// Records submissions against the current schema and reads them back
/// against whatever the schema has since become.
pub struct SubmissionRecorder {
    client: Client,
    types: Coll<QuestionType>,
    questions: Coll<Question>,
    options: Coll<QuestionOption>,
    submissions: Coll<Submission>,
    answers: Coll<Answer>,
}

impl SubmissionRecorder {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            types: Coll::from_db(db),
            questions: Coll::from_db(db),
            options: Coll::from_db(db),
            submissions: Coll::from_db(db),
            answers: Coll::from_db(db),
        }
    }

    /// Record a new pending submission with all its answers.
    pub async fn create(&self, spec: SubmissionSpec) -> Result<SubmissionDescription> {
        spec.validate()?;
        let submission = Submission {
            id: Id::new(),
            submission: SubmissionCore::new(),
        };

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        let result = self
            .create_in(&submission, spec.answers, &mut session)
            .await;
        finish(session, result).await?;

        info!("Recorded submission {}", submission.id);
        self.get(submission.id).await
    }

    async fn create_in(
        &self,
        submission: &Submission,
        answers: Vec<AnswerSpec>,
        session: &mut ClientSession,
    ) -> Result<()> {
        let mut new_answers = Vec::with_capacity(answers.len());
        for answer in answers {
            let question_id: Id = answer.question_id.into();
            let live = self
                .questions
                .count_documents_with_session(
                    QuestionCore::live_with_id(question_id),
                    None,
                    session,
                )
                .await?;
            if live == 0 {
                return Err(Error::invalid(format!(
                    "Question {question_id} does not exist"
                )));
            }
            let option_ids = self
                .resolve_options_in(question_id, &answer.option_ids, session)
                .await?;
            new_answers.push(Answer {
                id: Id::new(),
                answer: AnswerCore {
                    submission_id: submission.id,
                    question_id,
                    answer: answer.answer,
                    option_ids,
                },
            });
        }

        self.submissions
            .insert_one_with_session(submission, None, session)
            .await?;
        self.answers
            .insert_many_with_session(&new_answers, None, session)
            .await?;
        Ok(())
    }

    /// Keep the requested options that are live options of the question, in
    /// the order requested. Anything else is dropped.
    async fn resolve_options_in(
        &self,
        question_id: Id,
        requested: &[ApiId],
        session: &mut ClientSession,
    ) -> Result<Vec<Id>> {
        if requested.is_empty() {
            return Ok(Vec::new());
        }
        let requested: Vec<Id> = requested.iter().map(|id| **id).collect();
        let filter = doc! {
            "_id": { "$in": requested.clone() },
            "question_id": question_id,
            "deleted": false,
        };
        let mut cursor = self
            .options
            .find_with_session(filter, None, session)
            .await?;
        let live: HashSet<Id> = cursor
            .stream(session)
            .map_ok(|option| option.id)
            .try_collect()
            .await?;

        let mut seen = HashSet::new();
        Ok(requested
            .into_iter()
            .filter(|id| {
                if !live.contains(id) {
                    warn!("Dropping option {id}, not a live option of question {question_id}");
                    return false;
                }
                seen.insert(*id)
            })
            .collect())
    }

    /// Get a submission with its resolved answers.
    pub async fn get(&self, id: Id) -> Result<SubmissionDescription> {
        let submission = self
            .submissions
            .find_one(id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::NotFound("Submission".to_string()))?;
        let mut described = self.describe(vec![submission]).await?;
        described
            .pop()
            .ok_or_else(|| Error::NotFound("Submission".to_string()))
    }

    /// A page of submissions, newest first, optionally filtered by status.
    pub async fn get_all(
        &self,
        status: Option<SubmissionStatus>,
        pagination: Pagination,
    ) -> Result<Paginated<SubmissionDescription>> {
        let filter = match status {
            Some(status) => doc! { "status": status },
            None => doc! {},
        };
        let total = self
            .submissions
            .count_documents(filter.clone(), None)
            .await?;
        let options = FindOptions::builder()
            .sort(doc! { "submitted_at": -1, "_id": -1 })
            .skip(pagination.skip())
            .limit(pagination.page_size() as i64)
            .build();
        let submissions: Vec<Submission> = self
            .submissions
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        let described = self.describe(submissions).await?;
        Ok(pagination.paginated(described, total))
    }

    /// Overwrite the status of a submission. Any status may follow any other.
    pub async fn update_status(
        &self,
        id: Id,
        status: SubmissionStatus,
    ) -> Result<SubmissionDescription> {
        let result = self
            .submissions
            .update_one(id.as_doc(), doc! { "$set": { "status": status } }, None)
            .await?;
        if result.matched_count == 0 {
            return Err(Error::NotFound("Submission".to_string()));
        }
        info!("Submission {id} is now {status:?}");
        self.get(id).await
    }

    /// Resolve the answers of the given submissions to question and option
    /// text. Deleted questions and options still resolve.
    async fn describe(
        &self,
        submissions: Vec<Submission>,
    ) -> Result<Vec<SubmissionDescription>> {
        let submission_ids: Vec<Id> = submissions
            .iter()
            .map(|submission| submission.id)
            .collect();
        let sort = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let answers: Vec<Answer> = self
            .answers
            .find(doc! { "submission_id": { "$in": submission_ids } }, sort)
            .await?
            .try_collect()
            .await?;

        let question_ids: HashSet<Id> = answers
            .iter()
            .map(|answer| answer.question_id)
            .collect();
        let questions: HashMap<Id, Question> = self
            .questions
            .find(any_of(question_ids), None)
            .await?
            .map_ok(|question| (question.id, question))
            .try_collect()
            .await?;

        let type_ids: HashSet<Id> = questions
            .values()
            .map(|question| question.type_id)
            .collect();
        let types: HashMap<Id, QuestionType> = self
            .types
            .find(any_of(type_ids), None)
            .await?
            .map_ok(|question_type| (question_type.id, question_type))
            .try_collect()
            .await?;

        let option_ids: HashSet<Id> = answers
            .iter()
            .flat_map(|answer| answer.option_ids.iter().copied())
            .collect();
        let options: HashMap<Id, QuestionOption> = self
            .options
            .find(any_of(option_ids), None)
            .await?
            .map_ok(|option| (option.id, option))
            .try_collect()
            .await?;

        let mut by_submission: HashMap<Id, Vec<AnswerDescription>> = HashMap::new();
        for answer in answers {
            let question = questions.get(&answer.question_id);
            let type_name = question
                .and_then(|question| types.get(&question.type_id))
                .map(|question_type| question_type.name.clone());
            let selected = answer
                .option_ids
                .iter()
                .filter_map(|id| options.get(id))
                .map(|option| SelectedOption {
                    id: option.id.into(),
                    option_text: option.text.clone(),
                })
                .collect();
            by_submission
                .entry(answer.submission_id)
                .or_default()
                .push(AnswerDescription {
                    id: answer.id.into(),
                    question_id: answer.question_id.into(),
                    question: question.map(|question| question.text.clone()),
                    type_name,
                    answer: answer.answer.answer.clone(),
                    options: selected,
                });
        }

        Ok(submissions
            .into_iter()
            .map(|submission| SubmissionDescription {
                id: submission.id.into(),
                submitted_at: submission.submitted_at,
                status: submission.status,
                answers: by_submission.remove(&submission.id).unwrap_or_default(),
            })
            .collect())
    }
}

/// Matches documents whose `_id` is any of `ids`.
fn any_of(ids: HashSet<Id>) -> Document {
    doc! { "_id": { "$in": ids.into_iter().collect::<Vec<_>>() } }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SubmissionRecorder {
    type Error = ();

    /// Build a recorder from the managed database connection.
    ///
    /// Panics iff the [`Client`] or [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let client = req.guard::<&State<Client>>().await.unwrap();
        let db = req.guard::<&State<Database>>().await.unwrap();
        Outcome::Success(Self::new(client.inner().clone(), db))
    }
}
