// src/services/quiz.rs

use std::{collections::BTreeSet, sync::Arc};

use validator::Validate;

use crate::{
    config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MAX_QUESTIONS_PER_QUIZ},
    error::AppError,
    models::{
        analytics::{QuizAnalytics, StudentQuizStats},
        question::{CreateQuestionRequest, Question, UpdateQuestionRequest},
        quiz::{CreateQuizRequest, Pagination, Quiz, QuizDetail, QuizPage, UpdateQuizRequest},
        submission::{NewSubmission, QuizSubmission, SubmitQuizRequest},
    },
    services::{analytics, scoring},
    store::QuizRepository,
};

/// Quiz authoring, scoring and analytics over a `QuizRepository`.
#[derive(Clone)]
pub struct QuizService {
    repo: Arc<dyn QuizRepository>,
}

impl QuizService {
    pub fn new(repo: Arc<dyn QuizRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_quiz(&self, data: CreateQuizRequest, created_by: Option<i64>) -> Result<Quiz, AppError> {
        data.validate()?;
        let quiz = self.repo.create_quiz(&data, created_by).await?;
        tracing::info!(quiz_id = quiz.id, course_id = %quiz.course_id, "quiz created");
        Ok(quiz)
    }

    /// Quiz with its questions in display order, or `None` when absent.
    pub async fn get_quiz(&self, id: i64) -> Result<Option<QuizDetail>, AppError> {
        let Some(quiz) = self.repo.find_quiz(id).await? else {
            return Ok(None);
        };
        let questions = self.repo.list_questions(id).await?;
        Ok(Some(QuizDetail { quiz, questions }))
    }

    pub async fn list_quizzes(
        &self,
        course_id: &str,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<QuizPage, AppError> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let total = self.repo.count_quizzes(course_id).await?;
        let pagination = Pagination::new(page, limit, total);
        let offset = pagination
            .offset()
            .ok_or_else(|| AppError::BadRequest("Page number is too large".to_string()))?;
        let items = self.repo.list_quizzes(course_id, limit, offset).await?;

        Ok(QuizPage { items, pagination })
    }

    pub async fn update_quiz(&self, id: i64, changes: UpdateQuizRequest) -> Result<Quiz, AppError> {
        changes.validate()?;
        self.repo
            .update_quiz(id, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
    }

    /// Deletes the quiz together with its questions and submissions.
    pub async fn delete_quiz(&self, id: i64) -> Result<(), AppError> {
        if !self.repo.delete_quiz(id).await? {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        tracing::info!(quiz_id = id, "quiz deleted");
        Ok(())
    }

    pub async fn add_question(&self, quiz_id: i64, data: CreateQuestionRequest) -> Result<Question, AppError> {
        let question = scoring::new_question(data)?;
        self.repo
            .insert_question(quiz_id, &question, MAX_QUESTIONS_PER_QUIZ)
            .await
    }

    pub async fn update_question(&self, id: i64, data: UpdateQuestionRequest) -> Result<Question, AppError> {
        let changes = scoring::question_changes(data)?;
        self.repo
            .update_question(id, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Question not found".to_string()))
    }

    pub async fn delete_question(&self, id: i64) -> Result<(), AppError> {
        if !self.repo.delete_question(id).await? {
            return Err(AppError::NotFound("Question not found".to_string()));
        }
        Ok(())
    }

    /// Gives each listed question the order of its 1-based position.
    ///
    /// The list is not required to cover every question of the quiz.
    pub async fn reorder_questions(&self, quiz_id: i64, question_ids: &[i64]) -> Result<Vec<Question>, AppError> {
        if self.repo.find_quiz(quiz_id).await?.is_none() {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        self.repo.reorder_questions(quiz_id, question_ids).await?;
        self.repo.list_questions(quiz_id).await
    }

    pub fn check_answer(&self, question: &Question, answer: &str) -> bool {
        scoring::check_answer(question.question_type, &question.correct_answer, answer)
    }

    /// Checks an answer against a stored question.
    pub async fn check_stored_answer(&self, question_id: i64, answer: &str) -> Result<bool, AppError> {
        let question = self
            .repo
            .find_question(question_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
        Ok(self.check_answer(&question, answer))
    }

    /// Scores an attempt, stores it and awards XP on a pass.
    pub async fn submit_quiz(
        &self,
        quiz_id: i64,
        student_id: i64,
        request: SubmitQuizRequest,
    ) -> Result<QuizSubmission, AppError> {
        request.validate()?;

        let quiz = self
            .repo
            .find_quiz(quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

        if !quiz.is_active {
            return Err(AppError::BadRequest("Quiz is not active".to_string()));
        }

        let questions = self.repo.list_questions(quiz_id).await?;
        let outcome = scoring::score_submission(&questions, quiz.passing_score, quiz.xp_reward, &request.answers);

        let new_submission = NewSubmission {
            quiz_id,
            student_id,
            answers: outcome.answers,
            score: outcome.score,
            percentage: outcome.percentage,
            passed: outcome.passed,
            correct_answers: outcome.correct_answers,
            total_questions: outcome.total_questions,
            time_taken: request.time_taken,
            xp_earned: outcome.xp_earned,
        };
        // the attempt limit is enforced by the store in the same step as the insert
        let submission = self
            .repo
            .insert_submission(&new_submission, quiz.max_attempts)
            .await?;

        tracing::info!(
            quiz_id,
            student_id,
            score = submission.score,
            percentage = submission.percentage,
            passed = submission.passed,
            xp_earned = submission.xp_earned,
            "quiz submitted"
        );

        Ok(submission)
    }

    pub async fn get_quiz_analytics(&self, quiz_id: i64) -> Result<QuizAnalytics, AppError> {
        if self.repo.find_quiz(quiz_id).await?.is_none() {
            return Err(AppError::NotFound("Quiz not found".to_string()));
        }
        let submissions = self.repo.list_quiz_submissions(quiz_id).await?;
        Ok(analytics::summarize_quiz(quiz_id, &submissions))
    }

    /// A student's attempts at one quiz, newest first.
    pub async fn get_student_quiz_attempts(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> Result<Vec<QuizSubmission>, AppError> {
        self.repo.list_student_submissions(student_id, Some(quiz_id)).await
    }

    pub async fn get_student_quiz_stats(&self, student_id: i64) -> Result<StudentQuizStats, AppError> {
        let submissions = self.repo.list_student_submissions(student_id, None).await?;

        let quiz_ids: Vec<i64> = submissions
            .iter()
            .map(|s| s.quiz_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let titles = self.repo.quiz_titles(&quiz_ids).await?;

        Ok(analytics::summarize_student(student_id, &submissions, &titles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{submission::SubmittedAnswer, user::NewUser},
        store::{MemoryStore, UserRepository},
    };

    struct Fixture {
        service: QuizService,
        store: Arc<MemoryStore>,
        student_id: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let student = store
            .create_user(&NewUser {
                username: "student".to_string(),
                password_hash: "hash".to_string(),
                role: "student".to_string(),
            })
            .await
            .unwrap();
        Fixture {
            service: QuizService::new(store.clone()),
            store,
            student_id: student.id,
        }
    }

    fn quiz_request(xp_reward: i64) -> CreateQuizRequest {
        CreateQuizRequest {
            title: "Chapter 3 Quiz".to_string(),
            description: Some("Test your knowledge".to_string()),
            subject: Some("Mathematics".to_string()),
            course_id: "course-123".to_string(),
            difficulty: Some("Hard".to_string()),
            passing_score: Some(70),
            time_limit: Some(30),
            max_attempts: None,
            xp_reward: Some(xp_reward),
            is_active: Some(true),
        }
    }

    fn question(kind: &str, points: i64, correct: &str) -> CreateQuestionRequest {
        CreateQuestionRequest {
            question: "What is 2+2?".to_string(),
            question_type: kind.to_string(),
            points,
            options: vec!["3".to_string(), "4".to_string()],
            correct_answer: correct.to_string(),
            explanation: None,
        }
    }

    fn answers(pairs: &[(i64, &str)]) -> SubmitQuizRequest {
        SubmitQuizRequest {
            answers: pairs
                .iter()
                .map(|(id, a)| SubmittedAnswer {
                    question_id: *id,
                    answer: a.to_string(),
                })
                .collect(),
            time_taken: Some(120),
        }
    }

    async fn student_xp(f: &Fixture) -> i64 {
        f.store.find_user(f.student_id).await.unwrap().unwrap().xp
    }

    #[tokio::test]
    async fn test_submit_all_correct_passes_and_awards_xp() {
        let f = fixture().await;
        let quiz = f.service.create_quiz(quiz_request(100), Some(1)).await.unwrap();
        let q1 = f.service.add_question(quiz.id, question("MCQ", 5, "4")).await.unwrap();
        let q2 = f
            .service
            .add_question(quiz.id, question("TRUE_FALSE", 5, "true"))
            .await
            .unwrap();

        let result = f
            .service
            .submit_quiz(quiz.id, f.student_id, answers(&[(q1.id, "4"), (q2.id, "true")]))
            .await
            .unwrap();

        assert_eq!(result.score, 10);
        assert_eq!(result.percentage, 100);
        assert!(result.passed);
        assert_eq!(result.xp_earned, 100);
        assert_eq!(result.time_taken, Some(120));
        assert_eq!(student_xp(&f).await, 100);
    }

    #[tokio::test]
    async fn test_submit_partial_fails_without_xp() {
        let f = fixture().await;
        let quiz = f.service.create_quiz(quiz_request(100), None).await.unwrap();
        let q1 = f.service.add_question(quiz.id, question("MCQ", 5, "4")).await.unwrap();
        let q2 = f
            .service
            .add_question(quiz.id, question("TRUE_FALSE", 5, "true"))
            .await
            .unwrap();

        let result = f
            .service
            .submit_quiz(quiz.id, f.student_id, answers(&[(q1.id, "3"), (q2.id, "true")]))
            .await
            .unwrap();

        assert_eq!(result.score, 5);
        assert_eq!(result.percentage, 50);
        assert!(!result.passed);
        assert_eq!(result.correct_answers, 1);
        assert_eq!(result.total_questions, 2);
        assert_eq!(result.xp_earned, 0);
        assert_eq!(student_xp(&f).await, 0);
    }

    #[tokio::test]
    async fn test_submit_unknown_quiz_is_not_found() {
        let f = fixture().await;
        let err = f
            .service
            .submit_quiz(404, f.student_id, answers(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_submit_to_empty_quiz_scores_zero() {
        let f = fixture().await;
        let quiz = f.service.create_quiz(quiz_request(100), None).await.unwrap();
        let result = f
            .service
            .submit_quiz(quiz.id, f.student_id, answers(&[(1, "x")]))
            .await
            .unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.percentage, 0);
        assert!(!result.passed);
        assert_eq!(result.total_questions, 0);
    }

    #[tokio::test]
    async fn test_max_attempts_enforced() {
        let f = fixture().await;
        let mut request = quiz_request(0);
        request.max_attempts = Some(1);
        let quiz = f.service.create_quiz(request, None).await.unwrap();

        f.service
            .submit_quiz(quiz.id, f.student_id, answers(&[]))
            .await
            .unwrap();
        let err = f
            .service
            .submit_quiz(quiz.id, f.student_id, answers(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_inactive_quiz_rejects_submissions() {
        let f = fixture().await;
        let mut request = quiz_request(0);
        request.is_active = Some(false);
        let quiz = f.service.create_quiz(request, None).await.unwrap();

        let err = f
            .service
            .submit_quiz(quiz.id, f.student_id, answers(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_question_limit() {
        let f = fixture().await;
        let quiz = f.service.create_quiz(quiz_request(0), None).await.unwrap();
        for _ in 0..MAX_QUESTIONS_PER_QUIZ {
            f.service.add_question(quiz.id, question("MCQ", 1, "4")).await.unwrap();
        }

        let err = f
            .service
            .add_question(quiz.id, question("MCQ", 1, "4"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(f.store.count_questions(quiz.id).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_invalid_question_is_rejected_before_lookup() {
        let f = fixture().await;
        // quiz 999 does not exist, validation must still win
        let err = f
            .service
            .add_question(999, question("INVALID_TYPE", 1, "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_get_quiz_returns_ordered_questions() {
        let f = fixture().await;
        let quiz = f.service.create_quiz(quiz_request(0), None).await.unwrap();
        let a = f.service.add_question(quiz.id, question("MCQ", 1, "4")).await.unwrap();
        let b = f.service.add_question(quiz.id, question("MCQ", 2, "4")).await.unwrap();
        let c = f.service.add_question(quiz.id, question("MCQ", 3, "4")).await.unwrap();

        let reordered = f
            .service
            .reorder_questions(quiz.id, &[c.id, a.id, b.id])
            .await
            .unwrap();
        assert_eq!(reordered.iter().map(|q| q.order).collect::<Vec<_>>(), vec![1, 2, 3]);

        let detail = f.service.get_quiz(quiz.id).await.unwrap().unwrap();
        assert_eq!(
            detail.questions.iter().map(|q| q.id).collect::<Vec<_>>(),
            vec![c.id, a.id, b.id]
        );
        assert_eq!(detail.quiz.total_points, 6);

        assert!(f.service.get_quiz(12345).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_quizzes_paginates() {
        let f = fixture().await;
        for _ in 0..3 {
            f.service.create_quiz(quiz_request(0), None).await.unwrap();
        }

        let page = f
            .service
            .list_quizzes("course-123", Some(2), Some(2))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(
            page.pagination,
            Pagination {
                page: 2,
                limit: 2,
                total: 3,
                pages: 2
            }
        );

        let empty = f.service.list_quizzes("other", None, None).await.unwrap();
        assert!(empty.items.is_empty());
        assert_eq!(empty.pagination.limit, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_null_clears_nullable_fields() {
        let f = fixture().await;
        let mut request = quiz_request(0);
        request.max_attempts = Some(3);
        let quiz = f.service.create_quiz(request, None).await.unwrap();
        let question = f.service.add_question(quiz.id, question("MCQ", 1, "4")).await.unwrap();

        let changes: UpdateQuizRequest =
            serde_json::from_str(r#"{"description": null, "max_attempts": null}"#).unwrap();
        let updated = f.service.update_quiz(quiz.id, changes).await.unwrap();
        assert_eq!(updated.description, None);
        assert_eq!(updated.max_attempts, None);
        assert_eq!(updated.time_limit, Some(30));

        let with_explanation = f
            .service
            .update_question(
                question.id,
                UpdateQuestionRequest {
                    explanation: Some(Some("Because".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(with_explanation.explanation.as_deref(), Some("Because"));

        let changes: UpdateQuestionRequest = serde_json::from_str(r#"{"explanation": null}"#).unwrap();
        let cleared = f.service.update_question(question.id, changes).await.unwrap();
        assert_eq!(cleared.explanation, None);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_quiz() {
        let f = fixture().await;
        let update = UpdateQuizRequest {
            title: Some("Updated Title".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update_quiz(77, update).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            f.service.delete_quiz(77).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let f = fixture().await;
        let quiz = f.service.create_quiz(quiz_request(0), None).await.unwrap();
        let updated = f
            .service
            .update_quiz(
                quiz.id,
                UpdateQuizRequest {
                    title: Some("Updated Title".to_string()),
                    passing_score: Some(75),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Updated Title");
        assert_eq!(updated.passing_score, 75);
        assert_eq!(updated.course_id, "course-123");
        assert_eq!(updated.subject.as_deref(), Some("Mathematics"));
    }

    #[tokio::test]
    async fn test_check_stored_answer() {
        let f = fixture().await;
        let quiz = f.service.create_quiz(quiz_request(0), None).await.unwrap();
        let q = f
            .service
            .add_question(quiz.id, question("SHORT_ANSWER", 3, "Paris"))
            .await
            .unwrap();

        assert!(f.service.check_stored_answer(q.id, "PARIS").await.unwrap());
        assert!(!f.service.check_stored_answer(q.id, "Rome").await.unwrap());
    }

    #[tokio::test]
    async fn test_student_stats_and_attempts() {
        let f = fixture().await;
        let quiz = f.service.create_quiz(quiz_request(40), None).await.unwrap();
        let q = f.service.add_question(quiz.id, question("MCQ", 10, "4")).await.unwrap();

        f.service
            .submit_quiz(quiz.id, f.student_id, answers(&[(q.id, "3")]))
            .await
            .unwrap();
        f.service
            .submit_quiz(quiz.id, f.student_id, answers(&[(q.id, "4")]))
            .await
            .unwrap();

        let attempts = f
            .service
            .get_student_quiz_attempts(f.student_id, quiz.id)
            .await
            .unwrap();
        assert_eq!(attempts.len(), 2);

        let stats = f.service.get_student_quiz_stats(f.student_id).await.unwrap();
        assert_eq!(stats.total_attempts, 2);
        assert_eq!(stats.total_quizzes, 1);
        assert_eq!(stats.quizzes_passed, 1);
        assert_eq!(stats.total_xp_earned, 40);
        assert_eq!(stats.attempted_quizzes[0].title.as_deref(), Some("Chapter 3 Quiz"));
        assert_eq!(stats.attempted_quizzes[0].best_score, 10);
    }

    #[tokio::test]
    async fn test_huge_page_number_is_rejected() {
        let f = fixture().await;
        f.service.create_quiz(quiz_request(0), None).await.unwrap();

        let err = f
            .service
            .list_quizzes("course-123", Some(i64::MAX), Some(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_award_xp_once() {
        let f = fixture().await;
        let mut request = quiz_request(100);
        request.max_attempts = Some(1);
        let quiz = f.service.create_quiz(request, None).await.unwrap();
        let q = f.service.add_question(quiz.id, question("MCQ", 5, "4")).await.unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = f.service.clone();
                let (quiz_id, student_id) = (quiz.id, f.student_id);
                let request = answers(&[(q.id, "4")]);
                tokio::spawn(async move { service.submit_quiz(quiz_id, student_id, request).await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(err) => assert!(matches!(err, AppError::BadRequest(_))),
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(student_xp(&f).await, 100);
    }
}
