use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{OPTION_COUNT, Quiz};
use crate::error::{Result, StudyError};

/// Correct answers out of total questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl Score {
    /// Fraction correct in `[0, 1]`; zero for an empty quiz.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.correct as f64 / self.total as f64 }
    }

    pub fn percentage(&self) -> f64 {
        self.ratio() * 100.0
    }

    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.correct, self.total)
    }
}

/// Per-question grading feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// One-based question number.
    pub number: usize,
    pub question: String,
    pub submitted: Option<usize>,
    pub correct_index: usize,
    pub correct_option: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedResult {
    pub results: Vec<QuestionResult>,
    pub score: Score,
}

/// Grade `submitted` against `quiz`, one entry per question.
///
/// `None` marks an unanswered question. Unanswered questions and answer
/// indices outside the option range count as incorrect.
///
/// # Errors
///
/// Returns [`StudyError::InvalidInput`] when the submission length differs
/// from the question count.
pub fn grade(quiz: &Quiz, submitted: &[Option<usize>]) -> Result<GradedResult> {
    if submitted.len() != quiz.questions.len() {
        return Err(StudyError::InvalidInput(format!(
            "expected {} answers, got {}",
            quiz.questions.len(),
            submitted.len()
        )));
    }
    let out_of_range = submitted.iter().flatten().filter(|i| **i >= OPTION_COUNT).count();
    if out_of_range > 0 {
        warn!(out_of_range, "answer indices outside the option range graded as incorrect");
    }

    let results: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .zip(submitted)
        .enumerate()
        .map(|(i, (question, answer))| QuestionResult {
            number: i + 1,
            question: question.question().to_string(),
            submitted: *answer,
            correct_index: question.correct_index(),
            correct_option: question.correct_option().to_string(),
            is_correct: *answer == Some(question.correct_index()),
            explanation: question.explanation().map(str::to_string),
        })
        .collect();

    let score = Score {
        correct: results.iter().filter(|r| r.is_correct).count(),
        total: results.len(),
    };
    info!(topic = %quiz.topic, %score, "quiz graded");
    Ok(GradedResult { results, score })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Difficulty, QuizQuestion, QuizReport};

    fn quiz(correct: &[usize]) -> Quiz {
        let questions = correct
            .iter()
            .enumerate()
            .map(|(n, &c)| {
                QuizQuestion::new(
                    format!("Question {n}?"),
                    vec!["w".into(), "x".into(), "y".into(), "z".into()],
                    c,
                    Difficulty::Medium,
                    Some(format!("because {n}")),
                )
                .unwrap()
            })
            .collect::<Vec<_>>();
        Quiz {
            topic: "letters".into(),
            difficulty: Difficulty::Medium,
            report: QuizReport {
                requested: questions.len(),
                delivered: questions.len(),
                malformed_count: 0,
                duplicate_count: 0,
                repair_attempted: false,
                stages: Vec::new(),
            },
            questions,
            sources: vec!["letters.txt".into()],
        }
    }

    #[test]
    fn all_correct_scores_one() {
        let quiz = quiz(&[0, 2, 3]);
        let graded = grade(&quiz, &[Some(0), Some(2), Some(3)]).unwrap();
        assert_eq!(graded.score, Score { correct: 3, total: 3 });
        assert!((graded.score.ratio() - 1.0).abs() < f64::EPSILON);
        assert!(graded.score.is_perfect());
    }

    #[test]
    fn unanswered_scores_zero() {
        let quiz = quiz(&[1, 1]);
        let graded = grade(&quiz, &[None, None]).unwrap();
        assert_eq!(graded.score.correct, 0);
        assert_eq!(graded.score.to_string(), "0/2");
        assert!(graded.results.iter().all(|r| !r.is_correct && r.submitted.is_none()));
    }

    #[test]
    fn feedback_carries_correct_option_and_explanation() {
        let quiz = quiz(&[3]);
        let graded = grade(&quiz, &[Some(1)]).unwrap();
        let result = &graded.results[0];
        assert_eq!(result.number, 1);
        assert_eq!(result.correct_option, "z");
        assert_eq!(result.explanation.as_deref(), Some("because 0"));
        assert!((graded.score.percentage()).abs() < f64::EPSILON);
    }

    #[test]
    fn length_mismatch_is_invalid_input() {
        let quiz = quiz(&[0, 1]);
        assert!(matches!(grade(&quiz, &[Some(0)]), Err(StudyError::InvalidInput(_))));
        assert!(matches!(grade(&quiz, &[]), Err(StudyError::InvalidInput(_))));
    }

    #[test]
    fn out_of_range_answer_is_incorrect_not_an_error() {
        let quiz = quiz(&[0, 1]);
        let graded = grade(&quiz, &[Some(0), Some(4)]).unwrap();
        assert_eq!(graded.score, Score { correct: 1, total: 2 });
        assert!(!graded.results[1].is_correct);
        assert_eq!(graded.results[1].submitted, Some(4));

        let graded = grade(&quiz, &[Some(usize::MAX), None]).unwrap();
        assert_eq!(graded.score.correct, 0);
    }
}
