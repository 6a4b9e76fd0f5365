// src/models/analytics.rs

use serde::{Deserialize, Serialize};

/// Aggregated results for every submission of one quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizAnalytics {
    pub quiz_id: i64,
    pub total_submissions: i64,
    pub passed_submissions: i64,
    pub pass_rate: f64,
    pub average_score: f64,
    pub average_percentage: f64,
    pub average_time_taken: f64,
    pub highest_score: i64,
    pub lowest_score: i64,
}

/// Best result of one student on one quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptedQuiz {
    pub quiz_id: i64,
    pub title: Option<String>,
    pub best_score: i64,
    pub best_percentage: i64,
    pub attempts: i64,
    pub passed: bool,
}

/// Aggregated quiz results of one student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentQuizStats {
    pub student_id: i64,
    pub total_attempts: i64,
    pub total_quizzes: i64,
    pub quizzes_passed: i64,
    pub pass_rate: f64,
    /// Mean percentage across all attempts.
    pub average_score: f64,
    pub total_xp_earned: i64,
    pub attempted_quizzes: Vec<AttemptedQuiz>,
}
