// src/services/scoring.rs

//! Attempt scoring.
//!
//! Objective questions are checked against their answer key when a score is
//! requested; open-ended questions contribute whatever a teacher assigned.

use std::collections::HashMap;

use crate::{
    error::AppError,
    models::{
        answer::{AnswerKey, AnswerResponse, SaveScoresReceipt, ScoreInput, StudentAnswer},
        exam::Exam,
        question::{Question, QuestionType},
    },
    services::access::{Caller, load_exam},
    store::ExamStore,
};

/// Checks an objective answer against the question's answer key.
/// Multiple-select compares the sets order-independently; the other
/// objective types need the single correct value exactly.
pub fn is_correct(question: &Question, response: &AnswerResponse) -> bool {
    let correct = &question.correct_answers.0;

    match question.question_type {
        QuestionType::MultipleSelect => {
            let mut expected: Vec<&str> = correct.iter().map(String::as_str).collect();
            expected.sort_unstable();
            expected == response.sorted_choices()
        }
        QuestionType::SingleChoice | QuestionType::TrueFalse => {
            match (correct.as_slice(), response.single()) {
                ([expected], Some(given)) => expected == given,
                _ => false,
            }
        }
        QuestionType::OpenEnded => false,
    }
}

/// Points one stored answer contributes, or `None` when the answer does not
/// belong to a question of the exam.
fn answer_points(exam: &Exam, questions: &HashMap<i64, Question>, answer: &StudentAnswer) -> Option<f64> {
    let points = exam.points_for(answer.question_id)?;
    let question = questions.get(&answer.question_id)?;

    if question.question_type.is_auto_scored() {
        Some(if is_correct(question, &answer.response) {
            f64::from(points)
        } else {
            0.0
        })
    } else {
        Some(answer.score.unwrap_or(0.0))
    }
}

/// Total score of one attempt's answers.
///
/// Unanswered questions add nothing, and answers to questions that are no
/// longer part of the exam are skipped.
pub fn score_attempt(
    exam: &Exam,
    questions: &HashMap<i64, Question>,
    answers: &[StudentAnswer],
) -> i64 {
    let total: f64 = answers
        .iter()
        .filter_map(|answer| answer_points(exam, questions, answer))
        .sum();

    total.round() as i64
}

/// Loads the given questions keyed by id.
pub async fn load_questions(
    store: &dyn ExamStore,
    ids: &[i64],
) -> Result<HashMap<i64, Question>, AppError> {
    let questions = store.find_questions(ids).await?;
    Ok(questions.into_iter().map(|q| (q.id, q)).collect())
}

/// Records teacher-assigned scores for open-ended answers of one attempt.
///
/// The whole request is rejected before any write if a score targets a
/// question outside the exam or one that is scored automatically. Scores for
/// questions the student never answered are skipped.
pub async fn save_manual_scores(
    store: &dyn ExamStore,
    exam_id: i64,
    student_id: i64,
    caller: &Caller,
    attempt_number: i32,
    scores: &[ScoreInput],
) -> Result<SaveScoresReceipt, AppError> {
    caller.require_staff()?;

    let exam = load_exam(store, exam_id).await?;
    caller.require_owner(&exam, "score")?;

    let ids: Vec<i64> = scores.iter().map(|s| s.question_id).collect();
    let questions = load_questions(store, &ids).await?;

    for entry in scores {
        let Some(points) = exam.points_for(entry.question_id) else {
            return Err(AppError::BadRequest(format!(
                "Question {} is not part of this exam",
                entry.question_id
            )));
        };
        if entry.score > f64::from(points) {
            return Err(AppError::BadRequest(format!(
                "Score for question {} cannot exceed {} points",
                entry.question_id, points
            )));
        }
        match questions.get(&entry.question_id) {
            Some(q) if q.question_type == QuestionType::OpenEnded => {}
            Some(_) => {
                return Err(AppError::BadRequest(format!(
                    "Question {} is scored automatically",
                    entry.question_id
                )));
            }
            None => {
                return Err(AppError::BadRequest(format!(
                    "Question {} not found",
                    entry.question_id
                )));
            }
        }
    }

    let mut updated = 0;
    for entry in scores {
        let key = AnswerKey {
            exam_id: exam.id,
            student_id,
            question_id: entry.question_id,
            attempt_number,
        };
        if store.set_answer_score(key, entry.score).await? {
            updated += 1;
        }
    }

    tracing::info!(
        exam_id = exam.id,
        student_id,
        attempt_number,
        updated,
        graded_by = caller.id,
        "Manual scores saved"
    );

    Ok(SaveScoresReceipt {
        message: "Scores saved successfully".to_string(),
        updated,
    })
}
