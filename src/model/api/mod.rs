//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Field names are camel case.

pub mod auth;
pub mod id;
pub mod pagination;
pub mod query;
pub mod question;
pub mod response;
pub mod submission;
