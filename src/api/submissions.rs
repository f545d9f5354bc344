use rocket::{
    serde::json::{Error as JsonError, Json},
    Route,
};

use crate::error::{Error, Result};
use crate::form::SubmissionRecorder;
use crate::model::{
    api::{
        auth::{Admin, AuthToken, Staff},
        pagination::{Paginated, PaginationRequest},
        response::ApiResponse,
        submission::{StatusUpdate, SubmissionDescription, SubmissionFilter, SubmissionSpec},
    },
    mongodb::Id,
};

pub fn routes() -> Vec<Route> {
    routes![
        create_submission,
        get_submissions,
        get_submission,
        update_submission_status,
    ]
}

type Body<'r, T> = std::result::Result<Json<T>, JsonError<'r>>;

#[post("/form/submissions", data = "<spec>", format = "json")]
async fn create_submission(
    spec: Body<'_, SubmissionSpec>,
    recorder: SubmissionRecorder,
) -> Result<ApiResponse<SubmissionDescription>> {
    let spec = spec.map_err(Error::from)?.into_inner();
    let submission = recorder.create(spec).await?;
    Ok(ApiResponse::created(submission, "Submission received"))
}

/// Query values: `status`, `page_num` and `page_size`.
#[get("/form/submissions")]
async fn get_submissions(
    _token: AuthToken<Admin>,
    filter: Result<SubmissionFilter>,
    pagination: Result<PaginationRequest>,
    recorder: SubmissionRecorder,
) -> Result<ApiResponse<Paginated<SubmissionDescription>>> {
    let filter = filter?;
    let pagination = pagination?.validate()?;
    let submissions = recorder.get_all(filter.status, pagination).await?;
    Ok(ApiResponse::ok(submissions, "Submissions retrieved"))
}

#[get("/form/submissions/<submission_id>")]
async fn get_submission(
    _token: AuthToken<Staff>,
    submission_id: Id,
    recorder: SubmissionRecorder,
) -> Result<ApiResponse<SubmissionDescription>> {
    let submission = recorder.get(submission_id).await?;
    Ok(ApiResponse::ok(submission, "Submission retrieved"))
}

#[patch("/form/submissions/<submission_id>/status", data = "<update>", format = "json")]
async fn update_submission_status(
    _token: AuthToken<Admin>,
    submission_id: Id,
    update: Body<'_, StatusUpdate>,
    recorder: SubmissionRecorder,
) -> Result<ApiResponse<SubmissionDescription>> {
    let update = update.map_err(Error::from)?;
    let submission = recorder
        .update_status(submission_id, update.status)
        .await?;
    Ok(ApiResponse::ok(submission, "Submission status updated"))
}
