// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::{
    error::AppError,
    models::{question::QuestionView, user::UserSummary},
};

/// A question slot inside an exam together with its point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub question_id: i64,
    #[validate(range(min = 0, max = 100, message = "Points must be between 0 and 100."))]
    pub points: i32,
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    /// Time allowed per attempt, in minutes.
    pub duration: i32,

    /// How many attempts each assigned student may start (1-10).
    pub attempt_limit: i32,

    /// Ordered (question, points) pairs, stored as a JSON array.
    pub questions: Json<Vec<ExamQuestion>>,

    /// Ids of the students allowed to take the exam.
    pub assigned_students: Vec<i64>,

    pub is_finished: bool,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exam {
    pub fn is_assigned(&self, student_id: i64) -> bool {
        self.assigned_students.contains(&student_id)
    }

    /// Point value of a question, `None` if it is not part of this exam.
    pub fn points_for(&self, question_id: i64) -> Option<i32> {
        self.questions
            .iter()
            .find(|q| q.question_id == question_id)
            .map(|q| q.points)
    }

    pub fn question_ids(&self) -> Vec<i64> {
        self.questions.iter().map(|q| q.question_id).collect()
    }

    pub fn total_points(&self) -> i64 {
        self.questions.iter().map(|q| i64::from(q.points)).sum()
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time
    }
}

/// Values needed to insert a new exam row.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: i32,
    pub attempt_limit: i32,
    pub created_by: i64,
}

/// DTO for creating a new exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200, message = "Title length must be between 1 and 200 characters."))]
    pub title: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes."))]
    pub duration: i32,
    #[validate(range(min = 1, max = 10, message = "Attempt limit must be between 1 and 10."))]
    pub attempt_limit: Option<i32>,
}

/// DTO for updating an exam. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200, message = "Title length must be between 1 and 200 characters."))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes."))]
    pub duration: Option<i32>,
    #[validate(range(min = 1, max = 10, message = "Attempt limit must be between 1 and 10."))]
    pub attempt_limit: Option<i32>,
}

/// DTO for replacing the question list of an exam.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddQuestionsRequest {
    #[validate(nested)]
    pub questions_with_points: Vec<ExamQuestion>,
}

/// A numeric id that may arrive as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    pub fn parse(&self) -> Result<i64, AppError> {
        match self {
            RawId::Number(id) => Ok(*id),
            RawId::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid student id '{}'", text))),
        }
    }
}

/// A student reference in an assignment list.
/// Clients send either the bare id or the user object they already hold.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StudentRef {
    Id(RawId),
    Populated {
        #[serde(alias = "_id")]
        id: RawId,
    },
}

impl StudentRef {
    pub fn id(&self) -> Result<i64, AppError> {
        match self {
            StudentRef::Id(raw) | StudentRef::Populated { id: raw } => raw.parse(),
        }
    }
}

/// DTO for replacing the assigned student list of an exam.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignStudentsRequest {
    pub student_ids: Vec<StudentRef>,
}

/// Exam question resolved against the question bank.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestionDetail {
    pub points: i32,
    pub question: QuestionView,
}

/// Exam with its question and student references resolved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: i32,
    pub attempt_limit: i32,
    pub is_finished: bool,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserSummary>,
    pub questions: Vec<ExamQuestionDetail>,
    pub assigned_students: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checks that an exam window is well formed.
pub fn check_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if end <= start {
        return Err(AppError::BadRequest(
            "End time must be after start time".to_string(),
        ));
    }
    Ok(())
}
