// src/services/analytics.rs

use std::collections::{BTreeMap, HashMap};

use crate::models::{
    analytics::{AttemptedQuiz, QuizAnalytics, StudentQuizStats},
    submission::QuizSubmission,
};

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn rate(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Rolls up every submission of one quiz.
pub fn summarize_quiz(quiz_id: i64, submissions: &[QuizSubmission]) -> QuizAnalytics {
    let total = submissions.len();
    let passed = submissions.iter().filter(|s| s.passed).count() as i64;

    let score_sum: i64 = submissions.iter().map(|s| s.score).sum();
    let percentage_sum: i64 = submissions.iter().map(|s| s.percentage).sum();

    // only attempts that reported a duration count toward the average
    let timed: Vec<i64> = submissions.iter().filter_map(|s| s.time_taken).collect();
    let time_sum: i64 = timed.iter().sum();

    QuizAnalytics {
        quiz_id,
        total_submissions: total as i64,
        passed_submissions: passed,
        pass_rate: rate(passed, total as i64),
        average_score: mean(score_sum as f64, total),
        average_percentage: mean(percentage_sum as f64, total),
        average_time_taken: mean(time_sum as f64, timed.len()),
        highest_score: submissions.iter().map(|s| s.score).max().unwrap_or(0),
        lowest_score: submissions.iter().map(|s| s.score).min().unwrap_or(0),
    }
}

/// Rolls up every submission of one student, with a best-result entry per quiz.
///
/// `titles` maps quiz ids to titles; quizzes missing from it get `None`.
pub fn summarize_student(
    student_id: i64,
    submissions: &[QuizSubmission],
    titles: &HashMap<i64, String>,
) -> StudentQuizStats {
    let mut per_quiz: BTreeMap<i64, AttemptedQuiz> = BTreeMap::new();

    for submission in submissions {
        let entry = per_quiz.entry(submission.quiz_id).or_insert_with(|| AttemptedQuiz {
            quiz_id: submission.quiz_id,
            title: titles.get(&submission.quiz_id).cloned(),
            best_score: submission.score,
            best_percentage: submission.percentage,
            attempts: 0,
            passed: false,
        });
        entry.attempts += 1;
        entry.best_score = entry.best_score.max(submission.score);
        entry.best_percentage = entry.best_percentage.max(submission.percentage);
        entry.passed |= submission.passed;
    }

    let total_quizzes = per_quiz.len() as i64;
    let quizzes_passed = per_quiz.values().filter(|q| q.passed).count() as i64;
    let percentage_sum: i64 = submissions.iter().map(|s| s.percentage).sum();

    StudentQuizStats {
        student_id,
        total_attempts: submissions.len() as i64,
        total_quizzes,
        quizzes_passed,
        pass_rate: rate(quizzes_passed, total_quizzes),
        average_score: mean(percentage_sum as f64, submissions.len()),
        total_xp_earned: submissions.iter().map(|s| s.xp_earned).sum(),
        attempted_quizzes: per_quiz.into_values().collect(),
    }
}
