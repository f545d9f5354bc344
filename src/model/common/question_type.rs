use serde::{Deserialize, Serialize};

/// Type names whose questions are answered by picking from a fixed option set.
pub const CHOICE_BEARING_TYPES: [&str; 3] = ["multiple", "dropdown", "unique"];

/// Question types seeded into an empty database.
pub const DEFAULT_QUESTION_TYPES: [&str; 6] =
    ["text", "number", "date", "multiple", "dropdown", "unique"];

/// Whether questions of a given type carry options.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Answered by selecting options; must have at least one.
    ChoiceBearing,
    /// Answered with arbitrary text; never has options.
    FreeForm,
}

impl QuestionKind {
    /// Classify a question type by its name.
    pub fn from_type_name(name: &str) -> Self {
        if CHOICE_BEARING_TYPES.contains(&name) {
            Self::ChoiceBearing
        } else {
            Self::FreeForm
        }
    }

    pub fn requires_options(self) -> bool {
        self == Self::ChoiceBearing
    }
}
