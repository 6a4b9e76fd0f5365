// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::{
        question::{CheckAnswerRequest, CreateQuestionRequest, ReorderQuestionsRequest, UpdateQuestionRequest},
        quiz::{CreateQuizRequest, PublicQuizDetail, QuizListParams, UpdateQuizRequest},
    },
    services::quiz::QuizService,
    utils::jwt::Claims,
};

/// Creates a quiz owned by the calling instructor.
pub async fn create_quiz(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_instructor()?;
    let quiz = quizzes.create_quiz(payload, Some(claims.user_id()?)).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Returns a quiz with its questions.
///
/// Students receive the questions without correct answers or explanations.
pub async fn get_quiz(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let detail = quizzes
        .get_quiz(id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if claims.is_instructor() {
        Ok(Json(detail).into_response())
    } else {
        Ok(Json(PublicQuizDetail::from(detail)).into_response())
    }
}

/// Lists the quizzes of a course, newest first, with page metadata.
pub async fn list_course_quizzes(
    State(quizzes): State<QuizService>,
    Path(course_id): Path<String>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = quizzes
        .list_quizzes(&course_id, params.page, params.limit)
        .await?;
    Ok(Json(page))
}

pub async fn update_quiz(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_instructor()?;
    Ok(Json(quizzes.update_quiz(id, payload).await?))
}

/// Deletes a quiz; its questions and submissions go with it.
pub async fn delete_quiz(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_instructor()?;
    quizzes.delete_quiz(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_question(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_instructor()?;
    let question = quizzes.add_question(quiz_id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn reorder_questions(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<ReorderQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_instructor()?;
    let questions = quizzes
        .reorder_questions(quiz_id, &payload.question_ids)
        .await?;
    Ok(Json(questions))
}

pub async fn update_question(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_instructor()?;
    Ok(Json(quizzes.update_question(id, payload).await?))
}

pub async fn delete_question(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_instructor()?;
    quizzes.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Checks one answer against a stored question without recording anything.
pub async fn check_answer(
    State(quizzes): State<QuizService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<CheckAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_instructor()?;
    let correct = quizzes.check_stored_answer(id, &payload.answer).await?;
    Ok(Json(serde_json::json!({ "correct": correct })))
}
