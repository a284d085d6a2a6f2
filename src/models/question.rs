// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Kind of question. Decides how `correct_answers` is read and whether the
/// answer can be scored automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleSelect,
    TrueFalse,
    OpenEnded,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleSelect => "multiple_select",
            QuestionType::TrueFalse => "true_false",
            QuestionType::OpenEnded => "open_ended",
        }
    }

    /// Open-ended answers are only ever scored by hand.
    pub fn is_auto_scored(self) -> bool {
        !matches!(self, QuestionType::OpenEnded)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown question type '{0}'")]
pub struct UnknownQuestionType(pub String);

impl TryFrom<String> for QuestionType {
    type Error = UnknownQuestionType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "single_choice" => Ok(QuestionType::SingleChoice),
            "multiple_select" => Ok(QuestionType::MultipleSelect),
            "true_false" => Ok(QuestionType::TrueFalse),
            "open_ended" => Ok(QuestionType::OpenEnded),
            _ => Err(UnknownQuestionType(value)),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub text: String,

    /// Choices shown to the student. Empty for open-ended questions.
    pub options: Json<Vec<String>>,

    /// One value for single choice and true/false, a set for multiple
    /// select, empty for open-ended.
    pub correct_answers: Json<Vec<String>>,

    pub difficulty: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Question as embedded in an exam detail response.
/// `correct_answers` is only filled in for staff.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub options: Vec<String>,
    pub difficulty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<Vec<String>>,
}

impl QuestionView {
    pub fn new(question: &Question, reveal_answers: bool) -> Self {
        Self {
            id: question.id,
            question_type: question.question_type,
            text: question.text.clone(),
            options: question.options.0.clone(),
            difficulty: question.difficulty.clone(),
            correct_answers: reveal_answers.then(|| question.correct_answers.0.clone()),
        }
    }
}
