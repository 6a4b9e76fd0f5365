// src/models/submission.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

/// Represents the 'quiz_submissions' table in the database.
/// A submission is immutable once written.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct QuizSubmission {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,

    /// Question id -> submitted answer, as received.
    pub answers: Json<BTreeMap<i64, String>>,

    pub score: i64,
    pub percentage: i64,
    pub passed: bool,
    pub correct_answers: i64,
    pub total_questions: i64,

    /// Seconds the student spent on the attempt, when reported.
    pub time_taken: Option<i64>,
    pub xp_earned: i64,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One answer inside a submission request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: String,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    #[validate(length(max = 100, message = "Too many answers submitted"))]
    pub answers: Vec<SubmittedAnswer>,
    #[validate(range(min = 0, message = "Time taken cannot be negative"))]
    pub time_taken: Option<i64>,
}

/// Fully scored attempt, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub quiz_id: i64,
    pub student_id: i64,
    pub answers: BTreeMap<i64, String>,
    pub score: i64,
    pub percentage: i64,
    pub passed: bool,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub time_taken: Option<i64>,
    pub xp_earned: i64,
}
