// src/services/attempts.rs

//! Attempt lifecycle: who may start an attempt on an exam, and when.

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptStatus, NewAttempt, StartedAttempt},
        exam::Exam,
    },
    services::access::{Caller, load_exam, require_assigned},
    store::{ExamStore, StoreError},
};

fn limit_exceeded(limit: i32) -> AppError {
    AppError::InvalidState(format!(
        "You can take this exam maximum {} times. Your attempt limit has been exceeded.",
        limit
    ))
}

/// The unique index on (exam, student, attempt number) is the final guard
/// when two starts race past the count check.
fn creation_error(err: StoreError, limit: i32) -> AppError {
    match err {
        StoreError::UniqueViolation => limit_exceeded(limit),
        other => other.into(),
    }
}

/// Fails unless `now` lies inside the exam window and the exam is still open.
pub fn ensure_window_open(exam: &Exam, now: DateTime<Utc>) -> Result<(), AppError> {
    if !exam.has_started(now) {
        return Err(AppError::InvalidState("Exam has not started yet".to_string()));
    }
    if exam.has_ended(now) {
        return Err(AppError::InvalidState("Exam time has expired".to_string()));
    }
    if exam.is_finished {
        return Err(AppError::InvalidState("Exam has been finished".to_string()));
    }
    Ok(())
}

/// Starts a new attempt for the calling student.
///
/// The attempt number is the count of existing attempts plus one, so numbers
/// stay sequential from 1 and never exceed the exam's attempt limit.
pub async fn start_attempt(
    store: &dyn ExamStore,
    exam_id: i64,
    caller: &Caller,
    now: DateTime<Utc>,
) -> Result<StartedAttempt, AppError> {
    caller.require_student()?;

    let exam = load_exam(store, exam_id).await?;
    require_assigned(&exam, caller.id)?;
    ensure_window_open(&exam, now)?;

    let used = store.count_attempts(exam.id, caller.id).await?;
    if used >= i64::from(exam.attempt_limit) {
        return Err(limit_exceeded(exam.attempt_limit));
    }

    let attempt_number = i32::try_from(used + 1)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let attempt = store
        .create_attempt(NewAttempt {
            exam_id: exam.id,
            student_id: caller.id,
            attempt_number,
            started_at: now,
        })
        .await
        .map_err(|e| {
            tracing::warn!(exam_id = exam.id, student_id = caller.id, error = %e, "Attempt creation rejected");
            creation_error(e, exam.attempt_limit)
        })?;

    tracing::info!(
        exam_id = exam.id,
        student_id = caller.id,
        attempt_number,
        "Exam attempt started"
    );

    Ok(StartedAttempt {
        message: "Exam started successfully".to_string(),
        attempt_id: attempt.id,
        attempt_number,
        remaining_attempts: exam.attempt_limit - attempt_number,
    })
}

/// Fails if some student already used more attempts than `new_limit` allows.
pub async fn ensure_limit_covers_attempts(
    store: &dyn ExamStore,
    exam_id: i64,
    new_limit: i32,
) -> Result<(), AppError> {
    let used = store.max_attempts_used(exam_id).await?;
    if used > i64::from(new_limit) {
        return Err(AppError::InvalidState(format!(
            "Attempt limit cannot be lower than {}: a student has already used that many attempts",
            used
        )));
    }
    Ok(())
}

/// Reports whether the calling student may start another attempt. Writes nothing.
pub async fn check_attempts(
    store: &dyn ExamStore,
    exam_id: i64,
    caller: &Caller,
) -> Result<AttemptStatus, AppError> {
    caller
        .require_student()
        .map_err(|_| AppError::Forbidden("Only students can check attempts".to_string()))?;

    let exam = load_exam(store, exam_id).await?;
    require_assigned(&exam, caller.id)?;

    let used = store.count_attempts(exam.id, caller.id).await?;

    Ok(AttemptStatus {
        can_attempt: used < i64::from(exam.attempt_limit),
        attempts_used: used,
        attempts_limit: exam.attempt_limit,
        exam_title: exam.title,
    })
}
