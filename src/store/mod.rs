// src/store/mod.rs

//! Persistence collaborator.
//!
//! All state lives behind [`ExamStore`]. Both implementations enforce the two
//! uniqueness invariants at the record level:
//! `(exam_id, student_id, attempt_number)` for attempts and
//! `(exam_id, student_id, question_id, attempt_number)` for answers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    answer::{AnswerKey, AnswerResponse, StudentAnswer},
    attempt::{ExamAttempt, NewAttempt},
    exam::{Exam, ExamQuestion, NewExam},
    question::Question,
    user::User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shared handle used by handlers and services.
pub type Store = Arc<dyn ExamStore>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ExamStore: Send + Sync {
    // Users

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    /// Users with the given ids. Unknown ids are left out.
    async fn find_users(&self, ids: &[i64]) -> StoreResult<Vec<User>>;

    // Questions

    /// Questions with the given ids. Unknown ids are left out.
    async fn find_questions(&self, ids: &[i64]) -> StoreResult<Vec<Question>>;

    // Exams

    async fn find_exam(&self, id: i64) -> StoreResult<Option<Exam>>;

    /// All exams, newest first. With `assigned_to`, only exams that list the student.
    async fn list_exams(&self, assigned_to: Option<i64>) -> StoreResult<Vec<Exam>>;

    async fn create_exam(&self, exam: NewExam) -> StoreResult<Exam>;

    /// Persists the scalar fields (title, window, limits) of `exam`.
    async fn update_exam_details(&self, exam: &Exam) -> StoreResult<Option<Exam>>;

    async fn set_exam_questions(
        &self,
        exam_id: i64,
        questions: &[ExamQuestion],
    ) -> StoreResult<Option<Exam>>;

    async fn set_assigned_students(
        &self,
        exam_id: i64,
        student_ids: &[i64],
    ) -> StoreResult<Option<Exam>>;

    async fn finish_exam(&self, exam_id: i64, at: DateTime<Utc>) -> StoreResult<Option<Exam>>;

    /// Deletes the exam with its attempts and answers. Returns whether it existed.
    async fn delete_exam(&self, exam_id: i64) -> StoreResult<bool>;

    // Attempts

    async fn count_attempts(&self, exam_id: i64, student_id: i64) -> StoreResult<i64>;

    /// Highest number of attempts any single student has on the exam (0 if none).
    async fn max_attempts_used(&self, exam_id: i64) -> StoreResult<i64>;

    /// Fails with [`StoreError::UniqueViolation`] if the attempt number is taken.
    async fn create_attempt(&self, attempt: NewAttempt) -> StoreResult<ExamAttempt>;

    async fn find_attempt(&self, id: i64) -> StoreResult<Option<ExamAttempt>>;

    async fn list_attempts(&self, exam_id: i64) -> StoreResult<Vec<ExamAttempt>>;

    async fn complete_attempt(&self, id: i64, at: DateTime<Utc>) -> StoreResult<Option<ExamAttempt>>;

    // Answers

    /// Inserts or overwrites the response stored under `key`.
    /// An existing manual score is kept.
    async fn upsert_answer(
        &self,
        key: AnswerKey,
        response: &AnswerResponse,
        at: DateTime<Utc>,
    ) -> StoreResult<StudentAnswer>;

    async fn list_answers(
        &self,
        exam_id: i64,
        student_id: i64,
        attempt_number: i32,
    ) -> StoreResult<Vec<StudentAnswer>>;

    /// Sets the score of an existing answer. Returns `false` if there is none.
    async fn set_answer_score(&self, key: AnswerKey, score: f64) -> StoreResult<bool>;
}
