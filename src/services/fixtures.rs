// src/services/fixtures.rs

//! Builders shared by the service tests.

use chrono::{Duration, Utc};
use sqlx::types::Json;

use crate::{
    models::{
        answer::{AnswerResponse, StudentAnswer},
        exam::{Exam, ExamQuestion, NewExam},
        question::{Question, QuestionType},
        user::Role,
    },
    services::access::Caller,
    store::{ExamStore, MemoryStore},
};

pub(crate) fn exam(created_by: i64, attempt_limit: i32, questions: &[(i64, i32)]) -> Exam {
    let now = Utc::now();
    Exam {
        id: 1,
        title: "Algebra".to_string(),
        description: String::new(),
        start_time: now - Duration::hours(1),
        end_time: now + Duration::hours(1),
        duration: 30,
        attempt_limit,
        questions: Json(
            questions
                .iter()
                .map(|&(question_id, points)| ExamQuestion { question_id, points })
                .collect(),
        ),
        assigned_students: Vec::new(),
        is_finished: false,
        finished_at: None,
        created_by,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn question(id: i64, question_type: QuestionType, correct: &[&str]) -> Question {
    Question {
        id,
        question_type,
        text: format!("Question {}", id),
        options: Json(vec!["a".into(), "b".into(), "c".into()]),
        correct_answers: Json(correct.iter().map(|c| c.to_string()).collect()),
        difficulty: "easy".to_string(),
        created_at: None,
    }
}

pub(crate) fn answer(question_id: i64, response: AnswerResponse, score: Option<f64>) -> StudentAnswer {
    StudentAnswer {
        id: question_id * 100,
        exam_id: 1,
        student_id: 2,
        question_id,
        attempt_number: 1,
        response: Json(response),
        score,
        submitted_at: Utc::now(),
    }
}

pub(crate) fn text(value: &str) -> AnswerResponse {
    AnswerResponse::Text(value.to_string())
}

pub(crate) fn choices(values: &[&str]) -> AnswerResponse {
    AnswerResponse::Choices(values.iter().map(|v| v.to_string()).collect())
}

/// An open exam with three questions and two assigned students.
pub(crate) struct Scenario {
    pub store: MemoryStore,
    pub teacher: Caller,
    pub student: Caller,
    pub other_student: Caller,
    pub exam: Exam,
    pub single: Question,
    pub multi: Question,
    pub open: Question,
}

pub(crate) async fn scenario(attempt_limit: i32) -> Scenario {
    let store = MemoryStore::new();
    let teacher = store.insert_user("Tarık", "tarik@example.com", Role::Teacher).await;
    let student = store.insert_user("Zeynep", "zeynep@example.com", Role::Student).await;
    let other = store.insert_user("Ali", "ali@example.com", Role::Student).await;

    let single = store
        .insert_question(QuestionType::SingleChoice, "2 + 2?", &["3", "4"], &["4"])
        .await;
    let multi = store
        .insert_question(QuestionType::MultipleSelect, "Primes?", &["a", "b", "c"], &["a", "c"])
        .await;
    let open = store
        .insert_question(QuestionType::OpenEnded, "Explain.", &[], &[])
        .await;

    let now = Utc::now();
    let created = store
        .create_exam(NewExam {
            title: "Algebra".to_string(),
            description: String::new(),
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            duration: 30,
            attempt_limit,
            created_by: teacher.id,
        })
        .await
        .unwrap();

    store
        .set_exam_questions(
            created.id,
            &[
                ExamQuestion { question_id: single.id, points: 10 },
                ExamQuestion { question_id: multi.id, points: 20 },
                ExamQuestion { question_id: open.id, points: 10 },
            ],
        )
        .await
        .unwrap();
    let exam = store
        .set_assigned_students(created.id, &[student.id, other.id])
        .await
        .unwrap()
        .unwrap();

    Scenario {
        store,
        teacher: Caller { id: teacher.id, role: Role::Teacher },
        student: Caller { id: student.id, role: Role::Student },
        other_student: Caller { id: other.id, role: Role::Student },
        exam,
        single,
        multi,
        open,
    }
}
