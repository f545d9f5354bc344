use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::model::{
    api::{id::ApiId, query::StrictQuery},
    common::question_type::QuestionKind,
    db::{option::QuestionOption, question::Question, question_type::QuestionType},
};

pub const MAX_QUESTION_LENGTH: usize = 50;
pub const MAX_DESCRIPTION_LENGTH: usize = 255;
pub const MAX_OPTION_LENGTH: usize = 50;
pub const MAX_TYPE_NAME_LENGTH: usize = 50;

/// Collects validation failures so they can all be reported at once.
#[derive(Default)]
struct Checks(Vec<String>);

impl Checks {
    /// Require a non-blank value of at most `max` characters.
    fn required(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().is_empty() {
            self.0.push(format!("{field} is required"));
        } else {
            self.at_most(field, value, max);
        }
    }

    fn at_most(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.0.push(format!("{field} must be at most {max} characters"));
        }
    }

    fn options(&mut self, options: &[OptionSpec]) {
        for (i, option) in options.iter().enumerate() {
            self.required(&format!("Option {}", i + 1), &option.text, MAX_OPTION_LENGTH);
        }
    }

    fn finish(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.0))
        }
    }
}

/// A request to create a question type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionTypeSpec {
    #[serde(rename = "type")]
    pub name: String,
}

impl QuestionTypeSpec {
    pub fn validate(&self) -> Result<()> {
        let mut checks = Checks::default();
        checks.required("Type", &self.name, MAX_TYPE_NAME_LENGTH);
        checks.finish()
    }
}

/// A question type, as shown to API clients.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTypeDescription {
    pub id: ApiId,
    #[serde(rename = "type")]
    pub name: String,
    pub requires_options: bool,
}

impl From<QuestionType> for QuestionTypeDescription {
    fn from(question_type: QuestionType) -> Self {
        Self {
            id: question_type.id.into(),
            requires_options: question_type.requires_options(),
            name: question_type.question_type.name,
        }
    }
}

/// One option in a question's option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    #[serde(rename = "option")]
    pub text: String,
}

/// The option list of a request, distinguishing a missing field from a
/// present one. An explicit `null` counts as an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptionsField {
    #[default]
    Omitted,
    Explicit(Vec<OptionSpec>),
}

impl OptionsField {
    pub fn is_omitted(&self) -> bool {
        matches!(self, Self::Omitted)
    }

    /// The listed options, or none if omitted.
    pub fn into_options(self) -> Vec<OptionSpec> {
        match self {
            Self::Omitted => Vec::new(),
            Self::Explicit(options) => options,
        }
    }
}

impl<'de> Deserialize<'de> for OptionsField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let options = Option::<Vec<OptionSpec>>::deserialize(deserializer)?;
        Ok(Self::Explicit(options.unwrap_or_default()))
    }
}

impl Serialize for OptionsField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Omitted => serializer.serialize_none(),
            Self::Explicit(options) => options.serialize(serializer),
        }
    }
}

/// Distinguish an explicit `null` (`Some(None)`) from a missing field (`None`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}

/// A request to create a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSpec {
    #[serde(rename = "question")]
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    pub type_id: ApiId,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "OptionsField::is_omitted")]
    pub options: OptionsField,
}

impl QuestionSpec {
    /// Check field lengths. Whether options are needed depends on the type,
    /// which is checked against the database later.
    pub fn validate(&self) -> Result<()> {
        let mut checks = Checks::default();
        checks.required("Question", &self.text, MAX_QUESTION_LENGTH);
        if let Some(description) = &self.description {
            checks.at_most("Description", description, MAX_DESCRIPTION_LENGTH);
        }
        if let OptionsField::Explicit(options) = &self.options {
            checks.options(options);
        }
        checks.finish()
    }
}

/// A partial update of a question. Missing fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPatch {
    #[serde(rename = "question", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// `Some(None)` clears the description, as does an empty one.
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<ApiId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(default, skip_serializing_if = "OptionsField::is_omitted")]
    pub options: OptionsField,
}

impl QuestionPatch {
    pub fn validate(&self) -> Result<()> {
        let mut checks = Checks::default();
        if let Some(text) = &self.text {
            checks.required("Question", text, MAX_QUESTION_LENGTH);
        }
        if let Some(Some(description)) = &self.description {
            checks.at_most("Description", description, MAX_DESCRIPTION_LENGTH);
        }
        if let OptionsField::Explicit(options) = &self.options {
            checks.options(options);
        }
        checks.finish()
    }

    /// The description to store, if it changes: `Some(None)` clears it.
    pub fn new_description(&self) -> Option<Option<String>> {
        self.description.as_ref().map(|description| {
            description
                .as_ref()
                .filter(|description| !description.is_empty())
                .cloned()
        })
    }
}

/// Swap the positions of two questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub source_id: ApiId,
    pub target_id: ApiId,
}

/// An option, as shown to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescription {
    pub id: ApiId,
    #[serde(rename = "option")]
    pub text: String,
}

impl From<QuestionOption> for OptionDescription {
    fn from(option: QuestionOption) -> Self {
        Self {
            id: option.id.into(),
            text: option.option.text,
        }
    }
}

/// A question with its type and live options, as shown to API clients.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDescription {
    pub id: ApiId,
    #[serde(rename = "question")]
    pub text: String,
    pub description: Option<String>,
    pub type_id: ApiId,
    #[serde(rename = "type")]
    pub type_name: String,
    pub kind: QuestionKind,
    pub is_active: bool,
    pub is_required: bool,
    pub position: i64,
    pub options: Vec<OptionDescription>,
}

impl QuestionDescription {
    pub fn new(
        question: Question,
        question_type: &QuestionType,
        options: Vec<QuestionOption>,
    ) -> Self {
        Self {
            id: question.id.into(),
            type_id: question.type_id.into(),
            type_name: question_type.name.clone(),
            kind: question_type.kind,
            is_active: question.is_active,
            is_required: question.is_required,
            position: question.position,
            text: question.question.text,
            description: question.question.description,
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

/// Filters for listing questions, read from the `type_id` and `active`
/// query values.
#[derive(Debug, Default)]
pub struct QuestionFilter {
    pub type_id: Option<ApiId>,
    pub active: Option<bool>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for QuestionFilter {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let mut query = StrictQuery::new(req);
        let filter = Self {
            type_id: query.get("type_id"),
            active: query.get("active"),
        };
        query.finish(filter)
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl QuestionSpec {
        pub fn example(type_id: ApiId) -> Self {
            Self {
                text: "Favorite color?".to_string(),
                description: Some("Pick any".to_string()),
                type_id,
                is_active: true,
                is_required: true,
                options: OptionsField::Explicit(vec![
                    OptionSpec {
                        text: "Red".to_string(),
                    },
                    OptionSpec {
                        text: "Blue".to_string(),
                    },
                ]),
            }
        }

        pub fn free_form(type_id: ApiId) -> Self {
            Self {
                text: "Delivery notes".to_string(),
                description: None,
                type_id,
                is_active: true,
                is_required: false,
                options: OptionsField::Omitted,
            }
        }
    }
}
