use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::{Deserialize, Serialize};

/// The uniform envelope wrapped around every API response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub errors: Vec<String>,
    #[serde(skip, default = "default_status")]
    status: Status,
}

fn default_status() -> Status {
    Status::Ok
}

impl<T> ApiResponse<T> {
    /// A 200 response carrying `data`.
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::success(Status::Ok, Some(data), message)
    }

    /// A 201 response carrying the newly created `data`.
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::success(Status::Created, Some(data), message)
    }

    /// A failure response.
    pub fn failure(status: Status, message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors,
            status,
        }
    }

    fn success(status: Status, data: Option<T>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            errors: Vec::new(),
            status,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

impl ApiResponse<()> {
    /// A 200 response with no data.
    pub fn message(message: impl Into<String>) -> Self {
        Self::success(Status::Ok, None, message)
    }
}

impl<'r, 'o: 'r, T: Serialize> Responder<'r, 'o> for ApiResponse<T> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status;
        Response::build_from(Json(self).respond_to(req)?)
            .status(status)
            .ok()
    }
}
