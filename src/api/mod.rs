use rocket::{http::Status, Catcher, Request, Route};

use crate::error::INTERNAL_MESSAGE;
use crate::model::api::response::ApiResponse;

pub mod auth;
pub mod questions;
pub mod submissions;

#[cfg(test)]
pub(crate) mod test_support;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(questions::routes());
    routes.extend(submissions::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![envelope]
}

/// Wrap every error Rocket produces itself (failed guards, unmatched routes,
/// malformed forms) in the usual envelope.
#[catch(default)]
fn envelope(status: Status, _req: &Request<'_>) -> ApiResponse<()> {
    let message = match status.code {
        400 => "Invalid request",
        401 => "Authentication required",
        403 => "Insufficient permissions",
        404 => "Resource not found",
        422 => "Invalid request format",
        500 => INTERNAL_MESSAGE,
        _ => status.reason().unwrap_or("Request failed"),
    };
    ApiResponse::failure(status, message, Vec::new())
}
