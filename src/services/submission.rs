// src/services/submission.rs

//! Answer submission. Responses are stored per (exam, student, question,
//! attempt number) with overwrite semantics; nothing is scored here.

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::answer::{AnswerInput, AnswerKey, SubmissionReceipt},
    services::access::{Caller, load_exam, require_assigned},
    store::ExamStore,
};

/// Saves the caller's answers against one of their attempts and marks the
/// attempt completed. Repeating the call overwrites the earlier responses.
pub async fn submit_answers(
    store: &dyn ExamStore,
    exam_id: i64,
    caller: &Caller,
    attempt_id: i64,
    answers: &[AnswerInput],
    now: DateTime<Utc>,
) -> Result<SubmissionReceipt, AppError> {
    caller.require_student()?;

    let exam = load_exam(store, exam_id).await?;
    require_assigned(&exam, caller.id)?;

    let attempt = store
        .find_attempt(attempt_id)
        .await?
        .filter(|attempt| attempt.exam_id == exam.id)
        .ok_or(AppError::NotFound("Exam session not found".to_string()))?;

    if attempt.student_id != caller.id {
        tracing::warn!(
            exam_id = exam.id,
            attempt_id,
            caller_id = caller.id,
            "Rejected submission for another student's attempt"
        );
        return Err(AppError::Forbidden(
            "This exam session does not belong to you".to_string(),
        ));
    }

    if let Some(stray) = answers
        .iter()
        .find(|answer| exam.points_for(answer.question_id).is_none())
    {
        return Err(AppError::BadRequest(format!(
            "Question {} is not part of this exam",
            stray.question_id
        )));
    }

    for answer in answers {
        let key = AnswerKey {
            exam_id: exam.id,
            student_id: caller.id,
            question_id: answer.question_id,
            attempt_number: attempt.attempt_number,
        };
        store.upsert_answer(key, &answer.response, now).await?;
    }

    store.complete_attempt(attempt.id, now).await?;

    tracing::info!(
        exam_id = exam.id,
        student_id = caller.id,
        attempt_number = attempt.attempt_number,
        answers = answers.len(),
        "Answers submitted"
    );

    Ok(SubmissionReceipt {
        message: "Answers saved successfully".to_string(),
        attempt_number: attempt.attempt_number,
        saved_answers: answers.len(),
    })
}
