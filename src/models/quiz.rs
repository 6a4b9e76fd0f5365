// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{
    nullable,
    question::{PublicQuestion, Question},
};

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,

    /// Course (or grade) this quiz belongs to.
    pub course_id: String,
    pub difficulty: Option<String>,

    /// Percentage (0-100) a submission must reach to pass.
    pub passing_score: i64,

    /// Time limit in minutes.
    pub time_limit: Option<i64>,
    pub max_attempts: Option<i64>,
    pub xp_reward: i64,
    pub is_active: bool,
    pub created_by: Option<i64>,

    /// Sum of the points of all questions. Derived on read, never stored.
    pub total_points: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A quiz together with its questions, ordered by `order`.
#[derive(Debug, Clone, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

/// Student-facing view of a quiz (questions without answers).
#[derive(Debug, Serialize)]
pub struct PublicQuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

impl From<QuizDetail> for PublicQuizDetail {
    fn from(detail: QuizDetail) -> Self {
        PublicQuizDetail {
            quiz: detail.quiz,
            questions: detail.questions.into_iter().map(PublicQuestion::from).collect(),
        }
    }
}

/// DTO for creating a new quiz.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200, message = "Title length must be between 1 and 200 chars"))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Course id must be between 1 and 100 chars"))]
    pub course_id: String,
    #[validate(length(max = 50))]
    pub difficulty: Option<String>,
    #[validate(range(min = 0, max = 100, message = "Passing score must be between 0 and 100"))]
    pub passing_score: Option<i64>,
    #[validate(range(min = 1, message = "Time limit must be at least 1 minute"))]
    pub time_limit: Option<i64>,
    #[validate(range(min = 1, message = "Max attempts must be at least 1"))]
    pub max_attempts: Option<i64>,
    #[validate(range(min = 0, message = "XP reward cannot be negative"))]
    pub xp_reward: Option<i64>,
    pub is_active: Option<bool>,
}

/// DTO for updating a quiz. Fields are optional; nullable fields accept `null` to clear them.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200, message = "Title length must be between 1 and 200 chars"))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[validate(length(max = 100))]
    #[serde(default, deserialize_with = "nullable")]
    pub subject: Option<Option<String>>,
    #[validate(length(min = 1, max = 100, message = "Course id must be between 1 and 100 chars"))]
    pub course_id: Option<String>,
    #[validate(length(max = 50))]
    #[serde(default, deserialize_with = "nullable")]
    pub difficulty: Option<Option<String>>,
    #[validate(range(min = 0, max = 100, message = "Passing score must be between 0 and 100"))]
    pub passing_score: Option<i64>,
    #[validate(range(min = 1, message = "Time limit must be at least 1 minute"))]
    #[serde(default, deserialize_with = "nullable")]
    pub time_limit: Option<Option<i64>>,
    #[validate(range(min = 1, message = "Max attempts must be at least 1"))]
    #[serde(default, deserialize_with = "nullable")]
    pub max_attempts: Option<Option<i64>>,
    #[validate(range(min = 0, message = "XP reward cannot be negative"))]
    pub xp_reward: Option<i64>,
    pub is_active: Option<bool>,
}

impl UpdateQuizRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.subject.is_none()
            && self.course_id.is_none()
            && self.difficulty.is_none()
            && self.passing_score.is_none()
            && self.time_limit.is_none()
            && self.max_attempts.is_none()
            && self.xp_reward.is_none()
            && self.is_active.is_none()
    }
}

/// Query parameters for listing quizzes of a course.
#[derive(Debug, Default, Deserialize)]
pub struct QuizListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Pagination {
            page,
            limit,
            total,
            pages,
        }
    }

    /// Row offset of the page, or `None` when it does not fit in an `i64`.
    pub fn offset(&self) -> Option<i64> {
        (self.page - 1).checked_mul(self.limit)
    }
}

#[derive(Debug, Serialize)]
pub struct QuizPage {
    pub items: Vec<Quiz>,
    pub pagination: Pagination,
}
