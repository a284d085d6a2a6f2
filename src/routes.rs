// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, exam},
    state::AppState,
    utils::jwt::auth_middleware,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Every `/api/exams` route requires a bearer token.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store and config).
pub fn create_router(state: AppState) -> Router {
    let exam_routes = Router::new()
        .route("/", get(exam::list_exams).post(exam::create_exam))
        .route(
            "/{id}",
            get(exam::get_exam)
                .put(exam::update_exam)
                .delete(exam::delete_exam),
        )
        .route("/{id}/add-questions", post(exam::add_questions))
        .route("/{id}/assign-students", post(exam::assign_students))
        .route(
            "/{id}/finish",
            post(exam::finish_exam).patch(exam::finish_exam),
        )
        // Attempt lifecycle and scoring
        .route("/{id}/check-attempts", get(attempt::check_attempts))
        .route("/{id}/start", post(attempt::start_attempt))
        .route("/{id}/submit-answers", post(attempt::submit_answers))
        .route("/{id}/results", get(attempt::get_results))
        .route(
            "/{id}/student/{student_id}/answers",
            get(attempt::get_answer_sheet),
        )
        .route(
            "/{id}/student/{student_id}/scores",
            post(attempt::save_scores),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/exams", exam_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_origins)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, store::MemoryStore};

    fn test_state() -> AppState {
        AppState {
            store: Arc::new(MemoryStore::new()),
            config: Config {
                database_url: None,
                db_max_connections: 1,
                jwt_secret: "routes_test_secret".to_string(),
                rust_log: "error".to_string(),
                port: 0,
                cors_origins: vec!["http://localhost:3000".to_string(), "bad\norigin".to_string()],
            },
        }
    }

    #[tokio::test]
    async fn test_exam_routes_require_token() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::get("/api/exams").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::get("/api/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
