// src/models/answer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::models::{question::QuestionType, user::UserSummary};

/// What a student answered: free text / a single choice, or a set of choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerResponse {
    Text(String),
    Choices(Vec<String>),
}

impl AnswerResponse {
    /// The single value of the response, if it has exactly one.
    pub fn single(&self) -> Option<&str> {
        match self {
            AnswerResponse::Text(text) => Some(text),
            AnswerResponse::Choices(choices) if choices.len() == 1 => Some(&choices[0]),
            AnswerResponse::Choices(_) => None,
        }
    }

    /// All selected values, sorted.
    pub fn sorted_choices(&self) -> Vec<&str> {
        let mut choices: Vec<&str> = match self {
            AnswerResponse::Text(text) => vec![text.as_str()],
            AnswerResponse::Choices(choices) => choices.iter().map(String::as_str).collect(),
        };
        choices.sort_unstable();
        choices
    }
}

/// Composite identity of a stored answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnswerKey {
    pub exam_id: i64,
    pub student_id: i64,
    pub question_id: i64,
    pub attempt_number: i32,
}

/// Represents the 'student_answers' table in the database.
/// `(exam_id, student_id, question_id, attempt_number)` is unique.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAnswer {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub question_id: i64,
    pub attempt_number: i32,
    pub response: Json<AnswerResponse>,

    /// Manually assigned score (0-100). Only meaningful for open-ended questions.
    pub score: Option<f64>,

    pub submitted_at: DateTime<Utc>,
}

/// One (question, response) pair of a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: i64,
    pub response: AnswerResponse,
}

/// DTO for submitting the answers of an attempt.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswersRequest {
    #[validate(length(max = 500, message = "Too many answers in one submission."))]
    pub answers: Vec<AnswerInput>,
    pub attempt_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub message: String,
    pub attempt_number: i32,
    pub saved_answers: usize,
}

/// One manual score entry.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInput {
    pub question_id: i64,
    #[validate(range(min = 0.0, max = 100.0, message = "Score must be between 0 and 100."))]
    pub score: f64,
}

fn default_attempt_number() -> i32 {
    1
}

/// DTO for saving manual scores of one attempt.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveScoresRequest {
    #[validate(nested)]
    pub scores: Vec<ScoreInput>,
    #[validate(range(min = 1))]
    #[serde(default = "default_attempt_number")]
    pub attempt_number: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveScoresReceipt {
    pub message: String,
    pub updated: usize,
}

/// Query string of the answer sheet endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSheetParams {
    pub attempt_number: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ExamRef {
    pub id: i64,
    pub title: String,
}

/// One exam question next to what the student answered.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSheetItem {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answers: Vec<String>,
    pub difficulty: String,
    pub student_answer: Option<AnswerResponse>,
    pub score: f64,
    pub max_score: i32,
    pub is_manual_scoring: bool,
}

/// Everything a teacher needs to grade one attempt by hand.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSheet {
    pub student: UserSummary,
    pub exam: ExamRef,
    pub attempt_number: i32,
    pub questions: Vec<AnswerSheetItem>,
    pub total_max_score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_deserializes_text_and_list() {
        let text: AnswerResponse = serde_json::from_value(serde_json::json!("a")).unwrap();
        let list: AnswerResponse = serde_json::from_value(serde_json::json!(["c", "a"])).unwrap();

        assert_eq!(text, AnswerResponse::Text("a".into()));
        assert_eq!(list.sorted_choices(), vec!["a", "c"]);
        assert_eq!(list.single(), None);
    }

    #[test]
    fn test_response_rejects_numbers() {
        let parsed = serde_json::from_value::<AnswerResponse>(serde_json::json!(42));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_scores_request_defaults_to_first_attempt() {
        let req: SaveScoresRequest = serde_json::from_value(serde_json::json!({
            "scores": [{ "questionId": 1, "score": 7 }]
        }))
        .unwrap();
        assert_eq!(req.attempt_number, 1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_submission_size_is_capped() {
        let answer = AnswerInput {
            question_id: 1,
            response: AnswerResponse::Text("a".into()),
        };
        let within = SubmitAnswersRequest {
            answers: vec![answer.clone(); 500],
            attempt_id: 1,
        };
        let over = SubmitAnswersRequest {
            answers: vec![answer; 501],
            attempt_id: 1,
        };

        assert!(within.validate().is_ok());
        assert!(over.validate().is_err());
    }
}
