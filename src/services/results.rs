// src/services/results.rs

//! Result aggregation: one scored row per student, built from the student's
//! latest attempt.

use std::collections::HashMap;

use crate::{
    error::AppError,
    models::{
        answer::{AnswerSheet, AnswerSheetItem, ExamRef},
        attempt::ExamAttempt,
        result::{ExamResultRow, ResultStatus},
        user::{User, UserSummary},
    },
    services::{
        access::{Caller, load_exam},
        scoring::{load_questions, score_attempt},
    },
    store::ExamStore,
};

/// Keeps, for every student, the attempt with the highest attempt number.
pub fn latest_attempts(attempts: Vec<ExamAttempt>) -> Vec<ExamAttempt> {
    let mut latest: HashMap<i64, ExamAttempt> = HashMap::new();

    for attempt in attempts {
        match latest.get(&attempt.student_id) {
            Some(current) if current.attempt_number >= attempt.attempt_number => {}
            _ => {
                latest.insert(attempt.student_id, attempt);
            }
        }
    }

    latest.into_values().collect()
}

/// Scored result rows of an exam, ordered by student name.
/// Only the exam's creator or an admin may read them.
pub async fn get_exam_results(
    store: &dyn ExamStore,
    exam_id: i64,
    caller: &Caller,
) -> Result<Vec<ExamResultRow>, AppError> {
    caller.require_staff()?;

    let exam = load_exam(store, exam_id).await?;
    caller.require_owner(&exam, "view results of")?;

    let latest = latest_attempts(store.list_attempts(exam.id).await?);

    let student_ids: Vec<i64> = latest.iter().map(|a| a.student_id).collect();
    let students: HashMap<i64, User> = store
        .find_users(&student_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let questions = load_questions(store, &exam.question_ids()).await?;
    let total_questions = exam.questions.len();

    let mut rows = Vec::with_capacity(latest.len());
    for attempt in latest {
        let Some(student) = students.get(&attempt.student_id) else {
            tracing::warn!(
                exam_id = exam.id,
                student_id = attempt.student_id,
                "Skipping attempt of unknown student"
            );
            continue;
        };

        let answers = store
            .list_answers(exam.id, attempt.student_id, attempt.attempt_number)
            .await?;

        rows.push(ExamResultRow {
            attempt_id: attempt.id,
            student: UserSummary::from(student),
            attempt_number: attempt.attempt_number,
            score: score_attempt(&exam, &questions, &answers),
            total_questions,
            status: if attempt.is_completed {
                ResultStatus::Completed
            } else {
                ResultStatus::InProgress
            },
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            answered_questions: answers.len(),
        });
    }

    rows.sort_by(|a, b| {
        a.student
            .name
            .cmp(&b.student.name)
            .then(a.student.id.cmp(&b.student.id))
    });

    Ok(rows)
}

/// Every exam question next to one student's answer for one attempt,
/// as used for manual grading.
pub async fn answer_sheet(
    store: &dyn ExamStore,
    exam_id: i64,
    student_id: i64,
    attempt_number: i32,
    caller: &Caller,
) -> Result<AnswerSheet, AppError> {
    caller.require_staff()?;

    let exam = load_exam(store, exam_id).await?;
    caller.require_owner(&exam, "view")?;

    let student = store
        .find_user(student_id)
        .await?
        .ok_or(AppError::NotFound("Student not found".to_string()))?;

    let mut answers: HashMap<i64, _> = store
        .list_answers(exam.id, student.id, attempt_number)
        .await?
        .into_iter()
        .map(|a| (a.question_id, a))
        .collect();

    let questions = load_questions(store, &exam.question_ids()).await?;

    let items = exam
        .questions
        .iter()
        .filter_map(|slot| {
            let question = questions.get(&slot.question_id)?;
            let answer = answers.remove(&slot.question_id);

            Some(AnswerSheetItem {
                id: question.id,
                text: question.text.clone(),
                question_type: question.question_type,
                options: question.options.0.clone(),
                correct_answers: question.correct_answers.0.clone(),
                difficulty: question.difficulty.clone(),
                score: answer.as_ref().and_then(|a| a.score).unwrap_or(0.0),
                student_answer: answer.map(|a| a.response.0),
                max_score: slot.points,
                is_manual_scoring: !question.question_type.is_auto_scored(),
            })
        })
        .collect();

    Ok(AnswerSheet {
        student: UserSummary::from(&student),
        exam: ExamRef {
            id: exam.id,
            title: exam.title.clone(),
        },
        attempt_number,
        questions: items,
        total_max_score: exam.total_points(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        models::{answer::AnswerInput, user::Role},
        services::{
            attempts::start_attempt,
            fixtures::{choices, scenario, text},
            submission::submit_answers,
        },
    };

    #[tokio::test]
    async fn test_only_latest_attempt_is_reported() {
        let s = scenario(2).await;

        let first = start_attempt(&s.store, s.exam.id, &s.student, Utc::now()).await.unwrap();
        submit_answers(
            &s.store,
            s.exam.id,
            &s.student,
            first.attempt_id,
            &[AnswerInput { question_id: s.single.id, response: text("4") }],
            Utc::now(),
        )
        .await
        .unwrap();
        let second = start_attempt(&s.store, s.exam.id, &s.student, Utc::now()).await.unwrap();

        let rows = get_exam_results(&s.store, s.exam.id, &s.teacher).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attempt_id, second.attempt_id);
        assert_eq!(rows[0].attempt_number, 2);
        assert_eq!(rows[0].status, ResultStatus::InProgress);
        assert_eq!(rows[0].answered_questions, 0);
        assert_eq!(rows[0].score, 0);
        assert_eq!(rows[0].total_questions, 3);
    }

    #[tokio::test]
    async fn test_rows_are_scored_and_sorted_by_name() {
        let s = scenario(1).await;

        for (caller, multi) in [(&s.student, choices(&["c", "a"])), (&s.other_student, choices(&["b"]))] {
            let started = start_attempt(&s.store, s.exam.id, caller, Utc::now()).await.unwrap();
            submit_answers(
                &s.store,
                s.exam.id,
                caller,
                started.attempt_id,
                &[
                    AnswerInput { question_id: s.single.id, response: text("4") },
                    AnswerInput { question_id: s.multi.id, response: multi },
                ],
                Utc::now(),
            )
            .await
            .unwrap();
        }

        let rows = get_exam_results(&s.store, s.exam.id, &s.teacher).await.unwrap();
        let summary: Vec<(&str, i64)> = rows.iter().map(|r| (r.student.name.as_str(), r.score)).collect();

        assert_eq!(summary, vec![("Ali", 10), ("Zeynep", 30)]);
        assert!(rows.iter().all(|r| r.status == ResultStatus::Completed));
        assert!(rows.iter().all(|r| r.answered_questions == 2 && r.total_questions == 3));
    }

    #[tokio::test]
    async fn test_results_restricted_to_owner_or_admin() {
        let s = scenario(1).await;
        let stranger = s.store.insert_user("Ece", "ece@example.com", Role::Teacher).await;
        let admin = s.store.insert_user("Root", "root@example.com", Role::Admin).await;

        let err = get_exam_results(&s.store, s.exam.id, &Caller { id: stranger.id, role: Role::Teacher })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = get_exam_results(&s.store, s.exam.id, &s.student).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let rows = get_exam_results(&s.store, s.exam.id, &Caller { id: admin.id, role: Role::Admin })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_answer_sheet_lists_every_exam_question() {
        let s = scenario(1).await;
        let started = start_attempt(&s.store, s.exam.id, &s.student, Utc::now()).await.unwrap();
        submit_answers(
            &s.store,
            s.exam.id,
            &s.student,
            started.attempt_id,
            &[AnswerInput { question_id: s.open.id, response: text("Because.") }],
            Utc::now(),
        )
        .await
        .unwrap();

        let sheet = answer_sheet(&s.store, s.exam.id, s.student.id, 1, &s.teacher)
            .await
            .unwrap();

        assert_eq!(sheet.questions.len(), 3);
        assert_eq!(sheet.total_max_score, 40);
        let open = sheet.questions.iter().find(|q| q.id == s.open.id).unwrap();
        assert!(open.is_manual_scoring);
        assert_eq!(open.student_answer, Some(text("Because.")));
        assert_eq!(open.max_score, 10);
        let single = sheet.questions.iter().find(|q| q.id == s.single.id).unwrap();
        assert!(!single.is_manual_scoring);
        assert_eq!(single.student_answer, None);

        let err = answer_sheet(&s.store, s.exam.id, 9999, 1, &s.teacher).await.unwrap_err();
        assert_eq!(err, AppError::NotFound("Student not found".to_string()));
    }
}
