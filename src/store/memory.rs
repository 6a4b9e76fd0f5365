// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;

use crate::{
    config::DEFAULT_PASSING_SCORE,
    error::AppError,
    models::{
        chat::{Conversation, Message},
        question::{NewQuestion, Question, QuestionChanges},
        quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
        submission::{NewSubmission, QuizSubmission},
        user::{NewUser, User},
    },
    store::{ChatRepository, QuizRepository, UserRepository, attempt_limit_reached, question_limit_reached},
};

/// Raw message row; the sender's username is joined on read.
#[derive(Debug, Clone)]
struct StoredMessage {
    id: i64,
    conversation_id: i64,
    sender_id: i64,
    content: String,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: HashMap<i64, User>,
    quizzes: HashMap<i64, Quiz>,
    questions: HashMap<i64, Question>,
    submissions: HashMap<i64, QuizSubmission>,
    conversations: HashMap<i64, Conversation>,
    messages: HashMap<i64, StoredMessage>,
}

impl Tables {
    /// One shared sequence keeps ids unique across tables, which is all callers rely on.
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn total_points(&self, quiz_id: i64) -> i64 {
        self.questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .map(|q| q.points)
            .sum()
    }

    fn quiz_view(&self, quiz: &Quiz) -> Quiz {
        Quiz {
            total_points: self.total_points(quiz.id),
            ..quiz.clone()
        }
    }

    fn message_view(&self, message: &StoredMessage) -> Message {
        let sender_username = self
            .users
            .get(&message.sender_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();
        Message {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_username,
            content: message.content.clone(),
            created_at: Some(message.created_at),
        }
    }
}

/// In-process store with the same observable behavior as `PgStore`.
/// Every operation holds the table lock for its whole duration.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(submissions: &mut [QuizSubmission]) {
    submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl QuizRepository for MemoryStore {
    async fn create_quiz(&self, data: &CreateQuizRequest, created_by: Option<i64>) -> Result<Quiz, AppError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let now = Utc::now();
        let quiz = Quiz {
            id,
            title: data.title.clone(),
            description: data.description.clone(),
            subject: data.subject.clone(),
            course_id: data.course_id.clone(),
            difficulty: data.difficulty.clone(),
            passing_score: data.passing_score.unwrap_or(DEFAULT_PASSING_SCORE),
            time_limit: data.time_limit,
            max_attempts: data.max_attempts,
            xp_reward: data.xp_reward.unwrap_or(0),
            is_active: data.is_active.unwrap_or(true),
            created_by,
            total_points: 0,
            created_at: Some(now),
            updated_at: Some(now),
        };
        tables.quizzes.insert(id, quiz.clone());
        Ok(quiz)
    }

    async fn find_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.quizzes.get(&id).map(|q| tables.quiz_view(q)))
    }

    async fn list_quizzes(&self, course_id: &str, limit: i64, offset: i64) -> Result<Vec<Quiz>, AppError> {
        let tables = self.tables.read().await;
        let mut quizzes: Vec<&Quiz> = tables
            .quizzes
            .values()
            .filter(|q| q.course_id == course_id)
            .collect();
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(quizzes
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|q| tables.quiz_view(q))
            .collect())
    }

    async fn count_quizzes(&self, course_id: &str) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.quizzes.values().filter(|q| q.course_id == course_id).count() as i64)
    }

    async fn update_quiz(&self, id: i64, changes: &UpdateQuizRequest) -> Result<Option<Quiz>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(quiz) = tables.quizzes.get_mut(&id) else {
            return Ok(None);
        };

        if changes.is_empty() {
            let quiz = quiz.clone();
            return Ok(Some(tables.quiz_view(&quiz)));
        }

        if let Some(title) = &changes.title {
            quiz.title = title.clone();
        }
        if let Some(description) = &changes.description {
            quiz.description = description.clone();
        }
        if let Some(subject) = &changes.subject {
            quiz.subject = subject.clone();
        }
        if let Some(course_id) = &changes.course_id {
            quiz.course_id = course_id.clone();
        }
        if let Some(difficulty) = &changes.difficulty {
            quiz.difficulty = difficulty.clone();
        }
        if let Some(passing_score) = changes.passing_score {
            quiz.passing_score = passing_score;
        }
        if let Some(time_limit) = changes.time_limit {
            quiz.time_limit = time_limit;
        }
        if let Some(max_attempts) = changes.max_attempts {
            quiz.max_attempts = max_attempts;
        }
        if let Some(xp_reward) = changes.xp_reward {
            quiz.xp_reward = xp_reward;
        }
        if let Some(is_active) = changes.is_active {
            quiz.is_active = is_active;
        }
        quiz.updated_at = Some(Utc::now());

        let quiz = quiz.clone();
        Ok(Some(tables.quiz_view(&quiz)))
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.quizzes.remove(&id).is_none() {
            return Ok(false);
        }
        tables.questions.retain(|_, q| q.quiz_id != id);
        tables.submissions.retain(|_, s| s.quiz_id != id);
        Ok(true)
    }

    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>, AppError> {
        let tables = self.tables.read().await;
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.order, q.id));
        Ok(questions)
    }

    async fn count_questions(&self, quiz_id: i64) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.questions.values().filter(|q| q.quiz_id == quiz_id).count() as i64)
    }

    async fn insert_question(
        &self,
        quiz_id: i64,
        question: &NewQuestion,
        max_questions: i64,
    ) -> Result<Question, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.quizzes.contains_key(&quiz_id) {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        let orders: Vec<i64> = tables
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .map(|q| q.order)
            .collect();
        if orders.len() as i64 >= max_questions {
            return Err(question_limit_reached(max_questions));
        }

        let order = orders.into_iter().max().unwrap_or(0) + 1;
        let id = tables.next_id();
        let stored = Question {
            id,
            quiz_id,
            question: question.question.clone(),
            question_type: question.question_type,
            points: question.points,
            options: Json(question.options.clone()),
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
            order,
            created_at: Some(Utc::now()),
        };
        tables.questions.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.questions.get(&id).cloned())
    }

    async fn update_question(&self, id: i64, changes: &QuestionChanges) -> Result<Option<Question>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(question) = tables.questions.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(text) = &changes.question {
            question.question = text.clone();
        }
        if let Some(question_type) = changes.question_type {
            question.question_type = question_type;
        }
        if let Some(points) = changes.points {
            question.points = points;
        }
        if let Some(options) = &changes.options {
            question.options = Json(options.clone());
        }
        if let Some(correct_answer) = &changes.correct_answer {
            question.correct_answer = correct_answer.clone();
        }
        if let Some(explanation) = &changes.explanation {
            question.explanation = explanation.clone();
        }

        Ok(Some(question.clone()))
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.questions.remove(&id).is_some())
    }

    async fn reorder_questions(&self, quiz_id: i64, question_ids: &[i64]) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        for (index, question_id) in question_ids.iter().enumerate() {
            if let Some(question) = tables.questions.get_mut(question_id) {
                if question.quiz_id == quiz_id {
                    question.order = index as i64 + 1;
                }
            }
        }
        Ok(())
    }

    async fn insert_submission(
        &self,
        submission: &NewSubmission,
        max_attempts: Option<i64>,
    ) -> Result<QuizSubmission, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.quizzes.contains_key(&submission.quiz_id) {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        if !tables.users.contains_key(&submission.student_id) {
            return Err(AppError::NotFound("Student not found".to_string()));
        }

        if let Some(max_attempts) = max_attempts {
            let attempts = tables
                .submissions
                .values()
                .filter(|s| s.student_id == submission.student_id && s.quiz_id == submission.quiz_id)
                .count() as i64;
            if attempts >= max_attempts {
                return Err(attempt_limit_reached(max_attempts));
            }
        }

        let id = tables.next_id();
        let stored = QuizSubmission {
            id,
            quiz_id: submission.quiz_id,
            student_id: submission.student_id,
            answers: Json(submission.answers.clone()),
            score: submission.score,
            percentage: submission.percentage,
            passed: submission.passed,
            correct_answers: submission.correct_answers,
            total_questions: submission.total_questions,
            time_taken: submission.time_taken,
            xp_earned: submission.xp_earned,
            submitted_at: Some(Utc::now()),
        };
        tables.submissions.insert(id, stored.clone());

        if submission.xp_earned > 0 {
            if let Some(user) = tables.users.get_mut(&submission.student_id) {
                user.xp += submission.xp_earned;
            }
        }
        Ok(stored)
    }

    async fn list_quiz_submissions(&self, quiz_id: i64) -> Result<Vec<QuizSubmission>, AppError> {
        let tables = self.tables.read().await;
        let mut submissions: Vec<QuizSubmission> = tables
            .submissions
            .values()
            .filter(|s| s.quiz_id == quiz_id)
            .cloned()
            .collect();
        newest_first(&mut submissions);
        Ok(submissions)
    }

    async fn list_student_submissions(
        &self,
        student_id: i64,
        quiz_id: Option<i64>,
    ) -> Result<Vec<QuizSubmission>, AppError> {
        let tables = self.tables.read().await;
        let mut submissions: Vec<QuizSubmission> = tables
            .submissions
            .values()
            .filter(|s| s.student_id == student_id && quiz_id.is_none_or(|id| s.quiz_id == id))
            .cloned()
            .collect();
        newest_first(&mut submissions);
        Ok(submissions)
    }

    async fn count_student_submissions(&self, student_id: i64, quiz_id: i64) -> Result<i64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .submissions
            .values()
            .filter(|s| s.student_id == student_id && s.quiz_id == quiz_id)
            .count() as i64)
    }

    async fn quiz_titles(&self, ids: &[i64]) -> Result<HashMap<i64, String>, AppError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.quizzes.get(id).map(|q| (q.id, q.title.clone())))
            .collect())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!("Username '{}' already exists", user.username)));
        }

        let id = tables.next_id();
        let stored = User {
            id,
            username: user.username.clone(),
            password: user.password_hash.clone(),
            role: user.role.clone(),
            xp: 0,
            created_at: Some(Utc::now()),
        };
        tables.users.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn find_direct_conversation(&self, user_a: i64, user_b: i64) -> Result<Option<Conversation>, AppError> {
        let tables = self.tables.read().await;
        let mut matches: Vec<&Conversation> = tables
            .conversations
            .values()
            .filter(|c| !c.is_group && c.has_participant(user_a) && c.has_participant(user_b))
            .collect();
        matches.sort_by_key(|c| c.id);
        Ok(matches.first().map(|c| (*c).clone()))
    }

    async fn create_conversation(&self, participants: &[i64], is_group: bool) -> Result<Conversation, AppError> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let conversation = Conversation {
            id,
            is_group,
            participants: participants.to_vec(),
            created_at: Some(Utc::now()),
        };
        tables.conversations.insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation(&self, id: i64) -> Result<Option<Conversation>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.conversations.get(&id).cloned())
    }

    async fn insert_message(&self, conversation_id: i64, sender_id: i64, content: &str) -> Result<Message, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.conversations.contains_key(&conversation_id) {
            return Err(AppError::NotFound("Conversation not found".to_string()));
        }

        let id = tables.next_id();
        let stored = StoredMessage {
            id,
            conversation_id,
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let view = tables.message_view(&stored);
        tables.messages.insert(id, stored);
        Ok(view)
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>, AppError> {
        let tables = self.tables.read().await;
        let mut messages: Vec<&StoredMessage> = tables
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages.into_iter().map(|m| tables.message_view(m)).collect())
    }

    async fn find_message(&self, id: i64) -> Result<Option<Message>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.messages.get(&id).map(|m| tables.message_view(m)))
    }
}
