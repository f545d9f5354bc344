use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder, serde::json::Error as JsonError, Request};
use thiserror::Error;

use crate::model::{api::response::ApiResponse, mongodb::is_duplicate_key_error};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shown to clients in place of any internal failure detail.
pub const INTERNAL_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Schema mutation failed: {0}")]
    Transaction(DbError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
}

impl Error {
    /// A validation error with a single message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    /// Reclassify a store failure that happened inside a transaction.
    /// Unique-index violations are the client's fault; everything else is a
    /// failed mutation. Errors that are not store failures pass through.
    pub fn in_transaction(self) -> Self {
        match self {
            Self::Db(err) | Self::Transaction(err) if is_duplicate_key_error(&err) => {
                Self::invalid("Duplicate value where a unique value is required")
            }
            Self::Db(err) => Self::Transaction(err),
            other => other,
        }
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Transaction(_) | Self::Db(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature
                | JwtErrorKind::ImmatureSignature
                | JwtErrorKind::InvalidSignature => Status::Unauthorized,
                _ => Status::BadRequest,
            },
        }
    }

    /// Split into the envelope's `message` and `errors`, hiding internals.
    fn into_parts(self) -> (String, Vec<String>) {
        match self {
            Self::Validation(errors) => ("Invalid request".to_string(), errors),
            Self::BadRequest(msg) => ("Invalid request format".to_string(), vec![msg]),
            Self::Unauthorized(msg) => ("Authentication required".to_string(), vec![msg]),
            Self::Forbidden(msg) => ("Insufficient permissions".to_string(), vec![msg]),
            Self::NotFound(what) => (format!("{what} not found"), vec![]),
            Self::Transaction(_) => (
                INTERNAL_MESSAGE.to_string(),
                vec!["Schema mutation failed".to_string()],
            ),
            Self::Db(_) | Self::Argon2(_) => (
                INTERNAL_MESSAGE.to_string(),
                vec!["Internal error".to_string()],
            ),
            Self::Jwt(err) => ("Invalid token".to_string(), vec![err.to_string()]),
        }
    }
}

impl<'a> From<JsonError<'a>> for Error {
    fn from(err: JsonError<'a>) -> Self {
        match err {
            JsonError::Io(e) => Self::BadRequest(format!("Failed to read body: {e}")),
            JsonError::Parse(_, e) => Self::BadRequest(e.to_string()),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.class().is_server_error() {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        let (message, errors) = self.into_parts();
        ApiResponse::<()>::failure(status, message, errors).respond_to(req)
    }
}
