//! The dynamic form engine: schema management and submission recording.

mod questions;
mod submissions;

pub use questions::QuestionManager;
pub use submissions::SubmissionRecorder;
