// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::{
    config::{MAX_QUESTION_POINTS, MIN_QUESTION_POINTS},
    error::AppError,
    models::nullable,
};

/// The kinds of question a quiz can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::TrueFalse => "TRUE_FALSE",
            QuestionType::ShortAnswer => "SHORT_ANSWER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MCQ" => Some(QuestionType::Mcq),
            "TRUE_FALSE" => Some(QuestionType::TrueFalse),
            "SHORT_ANSWER" => Some(QuestionType::ShortAnswer),
            _ => None,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lets sqlx decode the TEXT `type` column straight into the enum.
impl TryFrom<String> for QuestionType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        QuestionType::parse(&value)
            .ok_or_else(|| AppError::InternalServerError(format!("Unknown question type '{}'", value)))
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,

    /// The prompt shown to the student.
    pub question: String,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub points: i64,

    /// Choices for MCQ / TRUE_FALSE questions.
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// Canonical answer. For choice questions this is one of `options`.
    pub correct_answer: String,

    pub explanation: Option<String>,

    /// 1-based display and answer position within the quiz.
    #[sqlx(rename = "sort_order")]
    pub order: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending question to client (excludes answer and explanation).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    pub points: i64,
    pub options: Json<Vec<String>>,
    pub order: i64,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_type: q.question_type,
            question: q.question,
            points: q.points,
            options: q.options,
            order: q.order,
        }
    }
}

/// DTO for adding a question to a quiz.
///
/// `type` stays a plain string here so that an unknown type reaches the
/// validator and produces a 400 instead of a deserialization rejection.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000, message = "Question text must be between 1 and 2000 chars"))]
    pub question: String,
    #[serde(rename = "type")]
    #[validate(custom(function = validate_question_type))]
    pub question_type: String,
    #[validate(range(min = MIN_QUESTION_POINTS, max = MAX_QUESTION_POINTS, message = "Points must be between 1 and 1000"))]
    pub points: i64,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500, message = "Correct answer must be between 1 and 500 chars"))]
    pub correct_answer: String,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000, message = "Question text must be between 1 and 2000 chars"))]
    pub question: Option<String>,
    #[serde(rename = "type")]
    #[validate(custom(function = validate_question_type))]
    pub question_type: Option<String>,
    #[validate(range(min = MIN_QUESTION_POINTS, max = MAX_QUESTION_POINTS, message = "Points must be between 1 and 1000"))]
    pub points: Option<i64>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    #[validate(length(min = 1, max = 500, message = "Correct answer must be between 1 and 500 chars"))]
    pub correct_answer: Option<String>,
    #[validate(length(max = 2000))]
    #[serde(default, deserialize_with = "nullable")]
    pub explanation: Option<Option<String>>,
}

/// Validated insert payload handed to the repository.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub points: i64,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

/// Validated partial update handed to the repository.
#[derive(Debug, Clone, Default)]
pub struct QuestionChanges {
    pub question: Option<String>,
    pub question_type: Option<QuestionType>,
    pub points: Option<i64>,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<String>,
    /// `Some(None)` clears the explanation.
    pub explanation: Option<Option<String>>,
}

impl QuestionChanges {
    pub fn is_empty(&self) -> bool {
        self.question.is_none()
            && self.question_type.is_none()
            && self.points.is_none()
            && self.options.is_none()
            && self.correct_answer.is_none()
            && self.explanation.is_none()
    }
}

/// DTO for reordering the questions of a quiz.
#[derive(Debug, Deserialize)]
pub struct ReorderQuestionsRequest {
    pub question_ids: Vec<i64>,
}

/// DTO for checking a single answer against a stored question.
#[derive(Debug, Deserialize)]
pub struct CheckAnswerRequest {
    pub answer: String,
}

fn validate_question_type(value: &str) -> Result<(), validator::ValidationError> {
    if QuestionType::parse(value).is_some() {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_question_type")
            .with_message("Question type must be one of MCQ, TRUE_FALSE, SHORT_ANSWER".into()))
    }
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() > 20 {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}
