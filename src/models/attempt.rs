// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exam_attempts' table in the database.
/// `(exam_id, student_id, attempt_number)` is unique.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAttempt {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,

    /// 1-based, sequential per student per exam.
    pub attempt_number: i32,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
}

/// Values needed to insert a new attempt row.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub exam_id: i64,
    pub student_id: i64,
    pub attempt_number: i32,
    pub started_at: DateTime<Utc>,
}

/// Outcome of starting an attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedAttempt {
    pub message: String,
    pub attempt_id: i64,
    pub attempt_number: i32,
    pub remaining_attempts: i32,
}

/// Read-only view of how many attempts a student has left.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStatus {
    pub can_attempt: bool,
    pub attempts_used: i64,
    pub attempts_limit: i32,
    pub exam_title: String,
}
