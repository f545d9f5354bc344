//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Field names are snake case.

pub mod answer;
pub mod option;
pub mod question;
pub mod question_type;
pub mod submission;
pub mod user;
