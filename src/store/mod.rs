// src/store/mod.rs

//! Persistence seams.
//!
//! Services only ever talk to these object-safe traits, held as
//! `Arc<dyn ...>`. `PgStore` is the production implementation;
//! `MemoryStore` backs the test-suite and database-less local runs.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        chat::{Conversation, Message},
        question::{NewQuestion, Question, QuestionChanges},
        quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
        submission::{NewSubmission, QuizSubmission},
        user::{NewUser, User},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub(crate) fn question_limit_reached(max_questions: i64) -> AppError {
    AppError::BadRequest(format!("Quiz cannot have more than {} questions", max_questions))
}

pub(crate) fn attempt_limit_reached(max_attempts: i64) -> AppError {
    AppError::BadRequest(format!("Maximum attempts ({}) reached for this quiz", max_attempts))
}

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn create_quiz(&self, data: &CreateQuizRequest, created_by: Option<i64>) -> Result<Quiz, AppError>;

    async fn find_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError>;

    /// Newest first.
    async fn list_quizzes(&self, course_id: &str, limit: i64, offset: i64) -> Result<Vec<Quiz>, AppError>;

    async fn count_quizzes(&self, course_id: &str) -> Result<i64, AppError>;

    /// Returns `None` when the quiz does not exist.
    async fn update_quiz(&self, id: i64, changes: &UpdateQuizRequest) -> Result<Option<Quiz>, AppError>;

    /// Removes the quiz with its questions and submissions. Returns false when absent.
    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError>;

    /// Questions of a quiz ordered by their `order` field.
    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>, AppError>;

    async fn count_questions(&self, quiz_id: i64) -> Result<i64, AppError>;

    /// Appends a question after the current highest order.
    ///
    /// The count check and the insert are one atomic step: fails with `NotFound`
    /// when the quiz is absent and `BadRequest` once it holds `max_questions`.
    async fn insert_question(
        &self,
        quiz_id: i64,
        question: &NewQuestion,
        max_questions: i64,
    ) -> Result<Question, AppError>;

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError>;

    /// Returns `None` when the question does not exist.
    async fn update_question(&self, id: i64, changes: &QuestionChanges) -> Result<Option<Question>, AppError>;

    async fn delete_question(&self, id: i64) -> Result<bool, AppError>;

    /// Sets each listed question's order to its 1-based position. Ids outside the quiz are ignored.
    async fn reorder_questions(&self, quiz_id: i64, question_ids: &[i64]) -> Result<(), AppError>;

    /// Stores the submission and, when `xp_earned > 0`, adds it to the student's XP
    /// counter. Both writes succeed or fail together.
    ///
    /// With `max_attempts` set, the student's existing attempts are counted in the
    /// same step and the insert fails with `BadRequest` once the limit is reached.
    async fn insert_submission(
        &self,
        submission: &NewSubmission,
        max_attempts: Option<i64>,
    ) -> Result<QuizSubmission, AppError>;

    async fn list_quiz_submissions(&self, quiz_id: i64) -> Result<Vec<QuizSubmission>, AppError>;

    /// Newest first, optionally narrowed to one quiz.
    async fn list_student_submissions(
        &self,
        student_id: i64,
        quiz_id: Option<i64>,
    ) -> Result<Vec<QuizSubmission>, AppError>;

    async fn count_student_submissions(&self, student_id: i64, quiz_id: i64) -> Result<i64, AppError>;

    /// Titles of the given quizzes in one lookup. Missing ids are left out.
    async fn quiz_titles(&self, ids: &[i64]) -> Result<HashMap<i64, String>, AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, AppError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// The non-group conversation that includes both users, if any.
    async fn find_direct_conversation(&self, user_a: i64, user_b: i64) -> Result<Option<Conversation>, AppError>;

    async fn create_conversation(&self, participants: &[i64], is_group: bool) -> Result<Conversation, AppError>;

    async fn find_conversation(&self, id: i64) -> Result<Option<Conversation>, AppError>;

    async fn insert_message(&self, conversation_id: i64, sender_id: i64, content: &str) -> Result<Message, AppError>;

    /// Oldest first.
    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>, AppError>;

    async fn find_message(&self, id: i64) -> Result<Option<Message>, AppError>;
}
