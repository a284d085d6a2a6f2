// src/models/result.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::user::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    InProgress,
}

/// One row of an exam's result list: a student's latest attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResultRow {
    pub attempt_id: i64,
    pub student: UserSummary,
    pub attempt_number: i32,
    pub score: i64,
    pub total_questions: usize,
    pub status: ResultStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub answered_questions: usize,
}
