// src/handlers/exam.rs

use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        exam::{
            AddQuestionsRequest, AssignStudentsRequest, CreateExamRequest, ExamDetail,
            ExamQuestionDetail, NewExam, UpdateExamRequest, check_window,
        },
        question::QuestionView,
        user::{Role, User, UserSummary},
    },
    services::{
        access::{load_exam, require_assigned},
        attempts::ensure_limit_covers_attempts,
        scoring::load_questions,
    },
    store::Store,
    utils::{html::clean_html, jwt::Claims},
};

/// Sanitizes a title and rejects it if nothing is left.
fn clean_title(raw: &str) -> Result<String, AppError> {
    let title = clean_html(raw).trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".to_string()));
    }
    Ok(title)
}

/// Lists exams, newest first.
/// Students only see the exams they are assigned to.
pub async fn list_exams(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;

    let assigned_to = match caller.role {
        Role::Student => Some(caller.id),
        Role::Teacher | Role::Admin => None,
    };

    let exams = store.list_exams(assigned_to).await?;
    Ok(Json(exams))
}

/// Creates an exam owned by the caller.
pub async fn create_exam(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    caller.require_staff()?;

    payload.validate()?;
    check_window(payload.start_time, payload.end_time)?;

    let exam = store
        .create_exam(NewExam {
            title: clean_title(&payload.title)?,
            description: clean_html(&payload.description),
            start_time: payload.start_time,
            end_time: payload.end_time,
            duration: payload.duration,
            attempt_limit: payload.attempt_limit.unwrap_or(1),
            created_by: caller.id,
        })
        .await?;

    tracing::info!(exam_id = exam.id, created_by = caller.id, "Exam created");

    Ok((StatusCode::CREATED, Json(exam)))
}

/// Returns one exam with its questions and assigned students resolved.
///
/// Students must be assigned and the window must have opened.
/// Correct answers are only included for staff.
pub async fn get_exam(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let exam = load_exam(store.as_ref(), id).await?;

    if caller.role == Role::Student {
        require_assigned(&exam, caller.id)?;
        if !exam.has_started(Utc::now()) {
            return Err(AppError::Forbidden("Exam has not started yet".to_string()));
        }
    }

    let questions = load_questions(store.as_ref(), &exam.question_ids()).await?;

    let mut user_ids = exam.assigned_students.clone();
    user_ids.push(exam.created_by);
    let users: HashMap<i64, User> = store
        .find_users(&user_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let reveal_answers = caller.role.is_staff();

    let detail = ExamDetail {
        id: exam.id,
        title: exam.title.clone(),
        description: exam.description.clone(),
        start_time: exam.start_time,
        end_time: exam.end_time,
        duration: exam.duration,
        attempt_limit: exam.attempt_limit,
        is_finished: exam.is_finished,
        finished_at: exam.finished_at,
        created_by: users.get(&exam.created_by).map(UserSummary::from),
        questions: exam
            .questions
            .iter()
            .filter_map(|slot| {
                questions.get(&slot.question_id).map(|q| ExamQuestionDetail {
                    points: slot.points,
                    question: QuestionView::new(q, reveal_answers),
                })
            })
            .collect(),
        assigned_students: exam
            .assigned_students
            .iter()
            .filter_map(|id| users.get(id).map(UserSummary::from))
            .collect(),
        created_at: exam.created_at,
        updated_at: exam.updated_at,
    };

    Ok(Json(detail))
}

/// Updates the scalar fields of an exam. Owner only.
pub async fn update_exam(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    caller.require_staff()?;
    payload.validate()?;

    let mut exam = load_exam(store.as_ref(), id).await?;
    caller.require_owner(&exam, "edit")?;

    if let Some(title) = &payload.title {
        exam.title = clean_title(title)?;
    }
    if let Some(description) = &payload.description {
        exam.description = clean_html(description);
    }
    if let Some(start_time) = payload.start_time {
        exam.start_time = start_time;
    }
    if let Some(end_time) = payload.end_time {
        exam.end_time = end_time;
    }
    if let Some(duration) = payload.duration {
        exam.duration = duration;
    }
    if let Some(attempt_limit) = payload.attempt_limit {
        ensure_limit_covers_attempts(store.as_ref(), exam.id, attempt_limit).await?;
        exam.attempt_limit = attempt_limit;
    }

    check_window(exam.start_time, exam.end_time)?;

    let updated = store
        .update_exam_details(&exam)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    Ok(Json(updated))
}

/// Deletes an exam together with its attempts and answers. Owner only.
pub async fn delete_exam(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    caller.require_staff()?;

    let exam = load_exam(store.as_ref(), id).await?;
    caller.require_owner(&exam, "delete")?;

    if !store.delete_exam(exam.id).await? {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    tracing::info!(exam_id = exam.id, deleted_by = caller.id, "Exam deleted");

    Ok(Json(json!({ "message": "Exam deleted successfully" })))
}

/// Replaces the question list of an exam. Owner only.
pub async fn add_questions(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AddQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    caller.require_staff()?;
    payload.validate()?;

    let exam = load_exam(store.as_ref(), id).await?;
    caller.require_owner(&exam, "edit")?;

    let mut seen = HashSet::new();
    for slot in &payload.questions_with_points {
        if !seen.insert(slot.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} is listed more than once",
                slot.question_id
            )));
        }
    }

    let ids: Vec<i64> = seen.into_iter().collect();
    let found = load_questions(store.as_ref(), &ids).await?;
    if let Some(missing) = payload
        .questions_with_points
        .iter()
        .find(|slot| !found.contains_key(&slot.question_id))
    {
        return Err(AppError::BadRequest(format!(
            "Question {} not found",
            missing.question_id
        )));
    }

    let updated = store
        .set_exam_questions(exam.id, &payload.questions_with_points)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    tracing::info!(
        exam_id = exam.id,
        questions = payload.questions_with_points.len(),
        "Exam questions replaced"
    );

    Ok(Json(updated))
}

/// Replaces the assigned student list of an exam. Owner only.
pub async fn assign_students(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<AssignStudentsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    caller.require_staff()?;

    let exam = load_exam(store.as_ref(), id).await?;
    caller.require_owner(&exam, "edit")?;

    let mut student_ids = Vec::with_capacity(payload.student_ids.len());
    for student in &payload.student_ids {
        let student_id = student.id()?;
        if !student_ids.contains(&student_id) {
            student_ids.push(student_id);
        }
    }

    let users: HashMap<i64, Role> = store
        .find_users(&student_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.role))
        .collect();

    for student_id in &student_ids {
        match users.get(student_id) {
            Some(Role::Student) => {}
            Some(_) => {
                return Err(AppError::BadRequest(format!(
                    "User {} is not a student",
                    student_id
                )));
            }
            None => {
                return Err(AppError::BadRequest(format!(
                    "Student {} not found",
                    student_id
                )));
            }
        }
    }

    let updated = store
        .set_assigned_students(exam.id, &student_ids)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    tracing::info!(exam_id = exam.id, students = student_ids.len(), "Students assigned");

    Ok(Json(updated))
}

/// Marks an exam as finished so no new attempts can start. Owner only.
pub async fn finish_exam(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    caller.require_staff()?;

    let exam = load_exam(store.as_ref(), id).await?;
    caller.require_owner(&exam, "finish")?;

    let exam = if exam.is_finished {
        exam
    } else {
        let finished = store
            .finish_exam(exam.id, Utc::now())
            .await?
            .ok_or(AppError::NotFound("Exam not found".to_string()))?;
        tracing::info!(exam_id = finished.id, finished_by = caller.id, "Exam finished");
        finished
    };

    Ok(Json(json!({
        "message": "Exam finished successfully",
        "exam": exam,
    })))
}
