// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, chat, quiz, submission},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public auth routes (register, login).
/// * Authenticated quiz, submission and chat routes. Instructor-only
///   handlers check the role themselves.
/// * The chat WebSocket, which verifies its own token.
/// * Admin routes behind a second middleware.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/api/courses/{course_id}/quizzes", get(quiz::list_course_quizzes))
        .route("/api/quizzes", post(quiz::create_quiz))
        .route(
            "/api/quizzes/{id}",
            get(quiz::get_quiz).put(quiz::update_quiz).delete(quiz::delete_quiz),
        )
        .route("/api/quizzes/{id}/questions", post(quiz::add_question))
        .route("/api/quizzes/{id}/questions/order", put(quiz::reorder_questions))
        .route(
            "/api/questions/{id}",
            put(quiz::update_question).delete(quiz::delete_question),
        )
        .route("/api/questions/{id}/check", post(quiz::check_answer))
        .route("/api/quizzes/{id}/submit", post(submission::submit_quiz))
        .route("/api/quizzes/{id}/attempts", get(submission::my_attempts))
        .route("/api/quizzes/{id}/analytics", get(submission::quiz_analytics))
        .route("/api/students/{id}/quiz-stats", get(submission::student_stats));

    let chat_routes = Router::new()
        .route("/api/chat/conversations", post(chat::open_conversation))
        .route(
            "/api/chat/{conversation_id}/messages",
            get(chat::list_messages).post(chat::send_message),
        );

    // authenticates itself (query token or bearer header)
    let socket_routes = Router::new().route("/api/chat/{conversation_id}/ws", get(chat::stream_conversation));

    let protected_routes = Router::new()
        .route("/api/me", get(auth::me))
        .merge(quiz_routes)
        .merge(chat_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/api/admin/users", post(auth::create_user))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(auth_routes)
        .merge(socket_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
