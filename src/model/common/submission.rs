use mongodb::bson::{to_bson, Bson};
use rocket::form::FromFormField;
use serde::{Deserialize, Serialize};

/// Review states of a submission. Any state may move to any other.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Awaiting review. Every submission starts here.
    #[field(value = "pending")]
    Pending,
    #[field(value = "approved")]
    Approved,
    #[field(value = "cancelled")]
    Cancelled,
}

impl Default for SubmissionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl From<SubmissionStatus> for Bson {
    fn from(status: SubmissionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::serde::json::serde_json;

    #[test]
    fn lowercase_names() {
        assert_eq!(
            serde_json::to_string(&SubmissionStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(
            Bson::from(SubmissionStatus::Approved),
            Bson::String("approved".to_string())
        );
        assert!(serde_json::from_str::<SubmissionStatus>("\"rejected\"").is_err());
    }
}
