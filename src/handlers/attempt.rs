// src/handlers/attempt.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppError,
    models::answer::{AnswerSheetParams, SaveScoresRequest, SubmitAnswersRequest},
    services::{attempts, results, scoring, submission},
    store::Store,
    utils::jwt::Claims,
};

/// Starts a new attempt for the calling student.
pub async fn start_attempt(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let started = attempts::start_attempt(store.as_ref(), id, &caller, Utc::now()).await?;
    Ok(Json(started))
}

/// Reports how many attempts the calling student has used.
pub async fn check_attempts(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let status = attempts::check_attempts(store.as_ref(), id, &caller).await?;
    Ok(Json(status))
}

/// Stores the answers of an attempt and completes it.
pub async fn submit_answers(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    payload.validate()?;

    let receipt = submission::submit_answers(
        store.as_ref(),
        id,
        &caller,
        payload.attempt_id,
        &payload.answers,
        Utc::now(),
    )
    .await?;

    Ok(Json(receipt))
}

/// Per-student results built from each student's latest attempt.
pub async fn get_results(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let rows = results::get_exam_results(store.as_ref(), id, &caller).await?;
    Ok(Json(rows))
}

/// A student's answers for one attempt, laid out for manual grading.
pub async fn get_answer_sheet(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path((id, student_id)): Path<(i64, i64)>,
    Query(params): Query<AnswerSheetParams>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    let attempt_number = params.attempt_number.unwrap_or(1);
    if attempt_number < 1 {
        return Err(AppError::BadRequest(
            "Attempt number must be at least 1".to_string(),
        ));
    }

    let sheet =
        results::answer_sheet(store.as_ref(), id, student_id, attempt_number, &caller).await?;
    Ok(Json(sheet))
}

/// Saves teacher-assigned scores for open-ended answers.
pub async fn save_scores(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path((id, student_id)): Path<(i64, i64)>,
    Json(payload): Json<SaveScoresRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller = claims.caller()?;
    payload.validate()?;

    let receipt = scoring::save_manual_scores(
        store.as_ref(),
        id,
        student_id,
        &caller,
        payload.attempt_number,
        &payload.scores,
    )
    .await?;

    Ok(Json(receipt))
}
