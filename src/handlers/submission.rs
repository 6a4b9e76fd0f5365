// src/handlers/submission.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::submission::SubmitQuizRequest,
    services::quiz::QuizService,
    utils::jwt::Claims,
};

/// Scores the caller's answers and stores the attempt.
///
/// XP is credited to the caller when the attempt passes.
pub async fn submit_quiz(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = quizzes
        .submit_quiz(quiz_id, claims.user_id()?, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// The caller's own attempts at a quiz, newest first.
pub async fn my_attempts(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = quizzes
        .get_student_quiz_attempts(claims.user_id()?, quiz_id)
        .await?;
    Ok(Json(attempts))
}

/// Pass rate, averages and extremes across all submissions of a quiz.
/// Instructors only.
pub async fn quiz_analytics(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_instructor()?;
    Ok(Json(quizzes.get_quiz_analytics(quiz_id).await?))
}

/// Quiz statistics for one student. Students may only read their own.
pub async fn student_stats(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if claims.user_id()? != student_id && !claims.is_instructor() {
        return Err(AppError::Forbidden("Cannot view another student's stats".to_string()));
    }
    Ok(Json(quizzes.get_student_quiz_stats(student_id).await?))
}
