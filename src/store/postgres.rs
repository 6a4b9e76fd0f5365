// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

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

/// `total_points` is derived from the questions table on every read.
const QUIZ_COLUMNS: &str = r#"
    q.id, q.title, q.description, q.subject, q.course_id, q.difficulty,
    q.passing_score, q.time_limit, q.max_attempts, q.xp_reward, q.is_active, q.created_by,
    (SELECT COALESCE(SUM(qs.points), 0)::BIGINT FROM questions qs WHERE qs.quiz_id = q.id) AS total_points,
    q.created_at, q.updated_at
"#;

const QUESTION_COLUMNS: &str =
    "id, quiz_id, question, type, points, options, correct_answer, explanation, sort_order, created_at";

const SUBMISSION_COLUMNS: &str = r#"
    id, quiz_id, student_id, answers, score, percentage, passed,
    correct_answers, total_questions, time_taken, xp_earned, submitted_at
"#;

const USER_COLUMNS: &str = "id, username, password, role, xp, created_at";

const CONVERSATION_COLUMNS: &str = "id, is_group, participants, created_at";

/// Logs the failing operation before mapping the error to a 500.
fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!("Failed to {}: {:?}", context, e);
        AppError::InternalServerError(e.to_string())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizRepository for PgStore {
    async fn create_quiz(&self, data: &CreateQuizRequest, created_by: Option<i64>) -> Result<Quiz, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quizzes
            (title, description, subject, course_id, difficulty, passing_score,
             time_limit, max_attempts, xp_reward, is_active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.subject)
        .bind(&data.course_id)
        .bind(&data.difficulty)
        .bind(data.passing_score.unwrap_or(DEFAULT_PASSING_SCORE))
        .bind(data.time_limit)
        .bind(data.max_attempts)
        .bind(data.xp_reward.unwrap_or(0))
        .bind(data.is_active.unwrap_or(true))
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create quiz"))?;

        self.find_quiz(id)
            .await?
            .ok_or_else(|| AppError::InternalServerError(format!("Quiz {} vanished after insert", id)))
    }

    async fn find_quiz(&self, id: i64) -> Result<Option<Quiz>, AppError> {
        let sql = format!("SELECT {} FROM quizzes q WHERE q.id = $1", QUIZ_COLUMNS);
        sqlx::query_as::<_, Quiz>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch quiz"))
    }

    async fn list_quizzes(&self, course_id: &str, limit: i64, offset: i64) -> Result<Vec<Quiz>, AppError> {
        let sql = format!(
            "SELECT {} FROM quizzes q WHERE q.course_id = $1 ORDER BY q.created_at DESC, q.id DESC LIMIT $2 OFFSET $3",
            QUIZ_COLUMNS
        );
        sqlx::query_as::<_, Quiz>(&sql)
            .bind(course_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list quizzes"))
    }

    async fn count_quizzes(&self, course_id: &str) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM quizzes WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count quizzes"))
    }

    async fn update_quiz(&self, id: i64, changes: &UpdateQuizRequest) -> Result<Option<Quiz>, AppError> {
        if changes.is_empty() {
            return self.find_quiz(id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET updated_at = NOW()");

        if let Some(title) = &changes.title {
            builder.push(", title = ");
            builder.push_bind(title.clone());
        }
        if let Some(description) = &changes.description {
            builder.push(", description = ");
            builder.push_bind(description.clone());
        }
        if let Some(subject) = &changes.subject {
            builder.push(", subject = ");
            builder.push_bind(subject.clone());
        }
        if let Some(course_id) = &changes.course_id {
            builder.push(", course_id = ");
            builder.push_bind(course_id.clone());
        }
        if let Some(difficulty) = &changes.difficulty {
            builder.push(", difficulty = ");
            builder.push_bind(difficulty.clone());
        }
        if let Some(passing_score) = changes.passing_score {
            builder.push(", passing_score = ");
            builder.push_bind(passing_score);
        }
        if let Some(time_limit) = changes.time_limit {
            builder.push(", time_limit = ");
            builder.push_bind(time_limit);
        }
        if let Some(max_attempts) = changes.max_attempts {
            builder.push(", max_attempts = ");
            builder.push_bind(max_attempts);
        }
        if let Some(xp_reward) = changes.xp_reward {
            builder.push(", xp_reward = ");
            builder.push_bind(xp_reward);
        }
        if let Some(is_active) = changes.is_active {
            builder.push(", is_active = ");
            builder.push_bind(is_active);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(db_error("update quiz"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_quiz(id).await
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        // questions and quiz_submissions go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete quiz"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>, AppError> {
        let sql = format!(
            "SELECT {} FROM questions WHERE quiz_id = $1 ORDER BY sort_order ASC, id ASC",
            QUESTION_COLUMNS
        );
        sqlx::query_as::<_, Question>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list questions"))
    }

    async fn count_questions(&self, quiz_id: i64) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count questions"))
    }

    async fn insert_question(
        &self,
        quiz_id: i64,
        question: &NewQuestion,
        max_questions: i64,
    ) -> Result<Question, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin question insert"))?;

        // concurrent inserts into the same quiz queue up behind this row lock
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM quizzes WHERE id = $1 FOR UPDATE")
            .bind(quiz_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("lock quiz"))?;
        if locked.is_none() {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("count questions"))?;
        if existing >= max_questions {
            return Err(question_limit_reached(max_questions));
        }

        let sql = format!(
            r#"
            INSERT INTO questions
            (quiz_id, question, type, points, options, correct_answer, explanation, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                    (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM questions WHERE quiz_id = $1))
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );
        let stored = sqlx::query_as::<_, Question>(&sql)
            .bind(quiz_id)
            .bind(&question.question)
            .bind(question.question_type.as_str())
            .bind(question.points)
            .bind(Json(question.options.clone()))
            .bind(&question.correct_answer)
            .bind(&question.explanation)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("create question"))?;

        tx.commit().await.map_err(db_error("commit question insert"))?;
        Ok(stored)
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let sql = format!("SELECT {} FROM questions WHERE id = $1", QUESTION_COLUMNS);
        sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch question"))
    }

    async fn update_question(&self, id: i64, changes: &QuestionChanges) -> Result<Option<Question>, AppError> {
        if changes.is_empty() {
            return self.find_question(id).await;
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
        let mut separated = builder.separated(", ");

        if let Some(question) = &changes.question {
            separated.push("question = ");
            separated.push_bind_unseparated(question.clone());
        }
        if let Some(question_type) = changes.question_type {
            separated.push("type = ");
            separated.push_bind_unseparated(question_type.as_str());
        }
        if let Some(points) = changes.points {
            separated.push("points = ");
            separated.push_bind_unseparated(points);
        }
        if let Some(options) = &changes.options {
            separated.push("options = ");
            separated.push_bind_unseparated(Json(options.clone()));
        }
        if let Some(correct_answer) = &changes.correct_answer {
            separated.push("correct_answer = ");
            separated.push_bind_unseparated(correct_answer.clone());
        }
        if let Some(explanation) = &changes.explanation {
            separated.push("explanation = ");
            separated.push_bind_unseparated(explanation.clone());
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(" RETURNING ");
        builder.push(QUESTION_COLUMNS);

        builder
            .build_query_as::<Question>()
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("update question"))
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete question"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn reorder_questions(&self, quiz_id: i64, question_ids: &[i64]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin reorder"))?;

        for (index, question_id) in question_ids.iter().enumerate() {
            sqlx::query("UPDATE questions SET sort_order = $1 WHERE id = $2 AND quiz_id = $3")
                .bind(index as i64 + 1)
                .bind(*question_id)
                .bind(quiz_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("reorder question"))?;
        }

        tx.commit().await.map_err(db_error("commit reorder"))?;
        Ok(())
    }

    async fn insert_submission(
        &self,
        submission: &NewSubmission,
        max_attempts: Option<i64>,
    ) -> Result<QuizSubmission, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin submission"))?;

        // one student's submissions are serialized on their user row
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(submission.student_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("lock student"))?;
        if locked.is_none() {
            return Err(AppError::NotFound("Student not found".to_string()));
        }

        if let Some(max_attempts) = max_attempts {
            let attempts: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM quiz_submissions WHERE student_id = $1 AND quiz_id = $2",
            )
            .bind(submission.student_id)
            .bind(submission.quiz_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("count attempts"))?;
            if attempts >= max_attempts {
                return Err(attempt_limit_reached(max_attempts));
            }
        }

        let sql = format!(
            r#"
            INSERT INTO quiz_submissions
            (quiz_id, student_id, answers, score, percentage, passed,
             correct_answers, total_questions, time_taken, xp_earned)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SUBMISSION_COLUMNS
        );
        let stored = sqlx::query_as::<_, QuizSubmission>(&sql)
            .bind(submission.quiz_id)
            .bind(submission.student_id)
            .bind(Json(submission.answers.clone()))
            .bind(submission.score)
            .bind(submission.percentage)
            .bind(submission.passed)
            .bind(submission.correct_answers)
            .bind(submission.total_questions)
            .bind(submission.time_taken)
            .bind(submission.xp_earned)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("create submission"))?;

        if submission.xp_earned > 0 {
            sqlx::query("UPDATE users SET xp = xp + $1 WHERE id = $2")
                .bind(submission.xp_earned)
                .bind(submission.student_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("award xp"))?;
        }

        tx.commit().await.map_err(db_error("commit submission"))?;
        Ok(stored)
    }

    async fn list_quiz_submissions(&self, quiz_id: i64) -> Result<Vec<QuizSubmission>, AppError> {
        let sql = format!(
            "SELECT {} FROM quiz_submissions WHERE quiz_id = $1 ORDER BY submitted_at DESC, id DESC",
            SUBMISSION_COLUMNS
        );
        sqlx::query_as::<_, QuizSubmission>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list quiz submissions"))
    }

    async fn list_student_submissions(
        &self,
        student_id: i64,
        quiz_id: Option<i64>,
    ) -> Result<Vec<QuizSubmission>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM quiz_submissions
            WHERE student_id = $1 AND ($2::BIGINT IS NULL OR quiz_id = $2)
            ORDER BY submitted_at DESC, id DESC
            "#,
            SUBMISSION_COLUMNS
        );
        sqlx::query_as::<_, QuizSubmission>(&sql)
            .bind(student_id)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list student submissions"))
    }

    async fn count_student_submissions(&self, student_id: i64, quiz_id: i64) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM quiz_submissions WHERE student_id = $1 AND quiz_id = $2")
            .bind(student_id)
            .bind(quiz_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count student submissions"))
    }

    async fn quiz_titles(&self, ids: &[i64]) -> Result<HashMap<i64, String>, AppError> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, title FROM quizzes WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("fetch quiz titles"))?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!("Username '{}' already exists", user.username))
                } else {
                    tracing::error!("Failed to create user: {:?}", e);
                    AppError::from(e)
                }
            })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch user"))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch user by username"))
    }
}

#[async_trait]
impl ChatRepository for PgStore {
    async fn find_direct_conversation(&self, user_a: i64, user_b: i64) -> Result<Option<Conversation>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM conversations
            WHERE is_group = FALSE AND participants @> ARRAY[$1, $2]::BIGINT[]
            ORDER BY id ASC
            LIMIT 1
            "#,
            CONVERSATION_COLUMNS
        );
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(user_a)
            .bind(user_b)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find conversation"))
    }

    async fn create_conversation(&self, participants: &[i64], is_group: bool) -> Result<Conversation, AppError> {
        let sql = format!(
            "INSERT INTO conversations (is_group, participants) VALUES ($1, $2) RETURNING {}",
            CONVERSATION_COLUMNS
        );
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(is_group)
            .bind(participants.to_vec())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("create conversation"))
    }

    async fn find_conversation(&self, id: i64) -> Result<Option<Conversation>, AppError> {
        let sql = format!("SELECT {} FROM conversations WHERE id = $1", CONVERSATION_COLUMNS);
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch conversation"))
    }

    async fn insert_message(&self, conversation_id: i64, sender_id: i64, content: &str) -> Result<Message, AppError> {
        sqlx::query_as::<_, Message>(
            r#"
            WITH inserted AS (
                INSERT INTO messages (conversation_id, sender_id, content)
                VALUES ($1, $2, $3)
                RETURNING id, conversation_id, sender_id, content, created_at
            )
            SELECT i.id, i.conversation_id, i.sender_id, u.username AS sender_username,
                   i.content, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.sender_id
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create message"))
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>, AppError> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT m.id, m.conversation_id, m.sender_id, u.username AS sender_username,
                   m.content, m.created_at
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.conversation_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list messages"))
    }

    async fn find_message(&self, id: i64) -> Result<Option<Message>, AppError> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT m.id, m.conversation_id, m.sender_id, u.username AS sender_username,
                   m.content, m.created_at
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find message"))
    }
}
