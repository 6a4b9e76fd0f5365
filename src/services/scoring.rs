// src/services/scoring.rs

use std::collections::BTreeMap;

use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{CreateQuestionRequest, NewQuestion, Question, QuestionChanges, QuestionType, UpdateQuestionRequest},
        submission::SubmittedAnswer,
    },
};

/// Validates a question payload and returns its parsed type.
///
/// Rejects unless `type` is one of MCQ, TRUE_FALSE, SHORT_ANSWER and
/// `points` lies in [1, 1000]. Pure: nothing is persisted.
pub fn validate_question_data(payload: &CreateQuestionRequest) -> Result<QuestionType, AppError> {
    payload.validate()?;
    QuestionType::parse(&payload.question_type)
        .ok_or_else(|| AppError::BadRequest("Question type must be one of MCQ, TRUE_FALSE, SHORT_ANSWER".to_string()))
}

/// Turns a validated create payload into a repository insert.
pub fn new_question(payload: CreateQuestionRequest) -> Result<NewQuestion, AppError> {
    let question_type = validate_question_data(&payload)?;
    Ok(NewQuestion {
        question: payload.question,
        question_type,
        points: payload.points,
        options: payload.options,
        correct_answer: payload.correct_answer,
        explanation: payload.explanation,
    })
}

/// Applies the same type and points rules to whichever fields a partial update carries.
pub fn question_changes(payload: UpdateQuestionRequest) -> Result<QuestionChanges, AppError> {
    payload.validate()?;
    let question_type = match payload.question_type.as_deref() {
        Some(raw) => Some(QuestionType::parse(raw).ok_or_else(|| {
            AppError::BadRequest("Question type must be one of MCQ, TRUE_FALSE, SHORT_ANSWER".to_string())
        })?),
        None => None,
    };
    Ok(QuestionChanges {
        question: payload.question,
        question_type,
        points: payload.points,
        options: payload.options,
        correct_answer: payload.correct_answer,
        explanation: payload.explanation,
    })
}

/// Decides whether `answer` matches the stored correct answer.
///
/// Short answers are trimmed and compared case-insensitively; choice
/// answers must match the canonical option exactly.
pub fn check_answer(question_type: QuestionType, correct_answer: &str, answer: &str) -> bool {
    match question_type {
        QuestionType::ShortAnswer => correct_answer.trim().to_lowercase() == answer.trim().to_lowercase(),
        QuestionType::Mcq | QuestionType::TrueFalse => correct_answer == answer,
    }
}

/// Result of scoring one attempt against a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub answers: BTreeMap<i64, String>,
    pub score: i64,
    pub percentage: i64,
    pub passed: bool,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub xp_earned: i64,
}

/// Scores submitted answers against a quiz's questions.
///
/// Answers naming an unknown question earn nothing. When a question id is
/// repeated the last answer counts, once.
pub fn score_submission(
    questions: &[Question],
    passing_score: i64,
    xp_reward: i64,
    submitted: &[SubmittedAnswer],
) -> ScoreOutcome {
    let answers: BTreeMap<i64, String> = submitted
        .iter()
        .map(|a| (a.question_id, a.answer.clone()))
        .collect();

    let total_points: i64 = questions.iter().map(|q| q.points).sum();
    let mut score = 0;
    let mut correct_answers = 0;

    for (question_id, answer) in &answers {
        let Some(question) = questions.iter().find(|q| q.id == *question_id) else {
            continue;
        };
        if check_answer(question.question_type, &question.correct_answer, answer) {
            score += question.points;
            correct_answers += 1;
        }
    }

    let percentage = percentage_of(score, total_points);
    let passed = total_points > 0 && percentage >= passing_score;

    ScoreOutcome {
        answers,
        score,
        percentage,
        passed,
        correct_answers,
        total_questions: questions.len() as i64,
        xp_earned: if passed { xp_reward } else { 0 },
    }
}

/// round(score / total * 100), or 0 for an empty quiz.
pub fn percentage_of(score: i64, total_points: i64) -> i64 {
    if total_points <= 0 {
        return 0;
    }
    ((score as f64 / total_points as f64) * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn question(id: i64, question_type: QuestionType, correct: &str, points: i64) -> Question {
        Question {
            id,
            quiz_id: 1,
            question: format!("Question {}", id),
            question_type,
            points,
            options: Json(vec![]),
            correct_answer: correct.to_string(),
            explanation: None,
            order: id,
            created_at: None,
        }
    }

    fn answer(question_id: i64, answer: &str) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id,
            answer: answer.to_string(),
        }
    }

    fn create_payload(question_type: &str, points: i64) -> CreateQuestionRequest {
        CreateQuestionRequest {
            question: "Test?".to_string(),
            question_type: question_type.to_string(),
            points,
            options: vec!["a".to_string()],
            correct_answer: "a".to_string(),
            explanation: None,
        }
    }

    fn two_question_quiz() -> Vec<Question> {
        vec![
            question(1, QuestionType::Mcq, "4", 5),
            question(2, QuestionType::TrueFalse, "true", 5),
        ]
    }

    #[test]
    fn test_validate_accepts_known_types() {
        assert_eq!(validate_question_data(&create_payload("MCQ", 1)).unwrap(), QuestionType::Mcq);
        assert_eq!(
            validate_question_data(&create_payload("TRUE_FALSE", 1000)).unwrap(),
            QuestionType::TrueFalse
        );
        assert_eq!(
            validate_question_data(&create_payload("SHORT_ANSWER", 3)).unwrap(),
            QuestionType::ShortAnswer
        );
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let err = validate_question_data(&create_payload("INVALID_TYPE", 1)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_validate_points_range() {
        for points in [0, -5, 1001] {
            let err = validate_question_data(&create_payload("MCQ", points)).unwrap_err();
            assert_eq!(
                err,
                AppError::BadRequest("Points must be between 1 and 1000".to_string())
            );
        }
    }

    #[test]
    fn test_partial_update_checks_supplied_fields_only() {
        assert!(question_changes(UpdateQuestionRequest::default()).unwrap().is_empty());

        let bad_points = UpdateQuestionRequest {
            points: Some(0),
            ..Default::default()
        };
        assert!(question_changes(bad_points).is_err());

        let bad_type = UpdateQuestionRequest {
            question_type: Some("ESSAY".to_string()),
            ..Default::default()
        };
        assert!(question_changes(bad_type).is_err());

        let ok = UpdateQuestionRequest {
            question_type: Some("SHORT_ANSWER".to_string()),
            ..Default::default()
        };
        assert_eq!(
            question_changes(ok).unwrap().question_type,
            Some(QuestionType::ShortAnswer)
        );
    }

    #[test]
    fn test_short_answer_is_case_insensitive() {
        assert!(check_answer(QuestionType::ShortAnswer, "Paris", "PARIS"));
        assert!(check_answer(QuestionType::ShortAnswer, "Paris", "  paris "));
        assert!(!check_answer(QuestionType::ShortAnswer, "Paris", "Lyon"));
    }

    #[test]
    fn test_choice_answers_are_exact() {
        assert!(!check_answer(QuestionType::Mcq, "4", "3"));
        assert!(check_answer(QuestionType::Mcq, "4", "4"));
        assert!(!check_answer(QuestionType::TrueFalse, "True", "true"));
        assert!(!check_answer(QuestionType::Mcq, "4", " 4"));
    }

    #[test]
    fn test_score_all_correct() {
        let outcome = score_submission(&two_question_quiz(), 70, 50, &[answer(1, "4"), answer(2, "true")]);
        assert_eq!(outcome.score, 10);
        assert_eq!(outcome.percentage, 100);
        assert!(outcome.passed);
        assert_eq!(outcome.correct_answers, 2);
        assert_eq!(outcome.total_questions, 2);
        assert_eq!(outcome.xp_earned, 50);
    }

    #[test]
    fn test_score_partial() {
        let outcome = score_submission(&two_question_quiz(), 70, 50, &[answer(1, "3"), answer(2, "true")]);
        assert_eq!(outcome.score, 5);
        assert_eq!(outcome.percentage, 50);
        assert!(!outcome.passed);
        assert_eq!(outcome.correct_answers, 1);
        assert_eq!(outcome.xp_earned, 0);
    }

    #[test]
    fn test_xp_only_on_pass() {
        let quiz = vec![question(1, QuestionType::Mcq, "4", 10)];
        assert_eq!(score_submission(&quiz, 70, 100, &[answer(1, "4")]).xp_earned, 100);
        assert_eq!(score_submission(&quiz, 70, 100, &[answer(1, "3")]).xp_earned, 0);
    }

    #[test]
    fn test_unknown_question_scores_nothing() {
        let outcome = score_submission(&two_question_quiz(), 70, 0, &[answer(99, "4")]);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.correct_answers, 0);
        assert_eq!(outcome.answers.get(&99).map(String::as_str), Some("4"));
    }

    #[test]
    fn test_repeated_answer_counts_once() {
        let outcome = score_submission(
            &two_question_quiz(),
            70,
            0,
            &[answer(1, "4"), answer(1, "4"), answer(1, "3")],
        );
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.correct_answers, 0);

        let outcome = score_submission(&two_question_quiz(), 70, 0, &[answer(1, "3"), answer(1, "4")]);
        assert_eq!(outcome.score, 5);
        assert_eq!(outcome.correct_answers, 1);
    }

    #[test]
    fn test_empty_quiz_never_divides_by_zero() {
        let outcome = score_submission(&[], 0, 100, &[answer(1, "4")]);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.percentage, 0);
        assert!(!outcome.passed);
        assert_eq!(outcome.xp_earned, 0);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(percentage_of(1, 3), 33);
        assert_eq!(percentage_of(2, 3), 67);
        assert_eq!(percentage_of(1, 8), 13);
        assert_eq!(percentage_of(0, 0), 0);
    }
}
