pub mod question_type;
pub mod role;
pub mod submission;
