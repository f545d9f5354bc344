use rocket::{
    form::FromForm,
    http::Status,
    request::{Outcome, Request},
};

use crate::error::Error;

/// Reads query values strictly: a value that is present but malformed is
/// reported rather than treated as missing.
pub struct StrictQuery<'a, 'r> {
    req: &'a Request<'r>,
    errors: Vec<String>,
}

impl<'a, 'r> StrictQuery<'a, 'r> {
    pub fn new(req: &'a Request<'r>) -> Self {
        Self {
            req,
            errors: Vec::new(),
        }
    }

    /// The parsed value of `name`, or `None` if it is absent or malformed.
    pub fn get<T: FromForm<'a>>(&mut self, name: &str) -> Option<T> {
        match self.req.query_value::<T>(name)? {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(format!("Invalid {name}: {err}"));
                None
            }
        }
    }

    /// Succeed with `value` unless some query value was malformed.
    pub fn finish<T>(self, value: T) -> Outcome<T, Error> {
        if self.errors.is_empty() {
            Outcome::Success(value)
        } else {
            Outcome::Failure((Status::BadRequest, Error::Validation(self.errors)))
        }
    }
}
