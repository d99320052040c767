//! Multiple-choice quiz generation, validation, repair and grading.
//!
//! Generation runs a small state machine per request:
//!
//! ```text
//! Requested → ContextRetrieved → GeneratedRaw → Parsed → Validated
//!     → Ready
//!     → RepairAttempted → Parsed → Validated → Ready | Failed
//! ```
//!
//! A quiz that is still short after the single repair attempt is returned
//! with the shortfall recorded in its [`QuizReport`]; only a quiz with no
//! valid question at all fails.

mod grading;
mod parser;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::completion::CompletionOptions;
use crate::error::{Result, StudyError};
use crate::gateway::CompletionGateway;
use crate::prompts::{self, QUIZ_TEMPLATE};
use crate::retriever::{Retriever, unique_sources};

pub use grading::{GradedResult, QuestionResult, Score, grade};
pub use parser::{ParsedQuiz, parse_quiz_output};

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

/// Requested question difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        })
    }
}

impl FromStr for Difficulty {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(StudyError::InvalidInput(format!("unknown difficulty '{other}'"))),
        }
    }
}

/// A validated multiple-choice question.
///
/// Construction goes through [`QuizQuestion::new`] (deserialization too), so
/// every value has a non-empty stem, exactly four distinct options and a
/// correct index below four.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuestionFields")]
pub struct QuizQuestion {
    question: String,
    options: [String; OPTION_COUNT],
    correct_index: usize,
    difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
}

#[derive(Deserialize)]
struct QuestionFields {
    question: String,
    options: Vec<String>,
    correct_index: usize,
    difficulty: Difficulty,
    #[serde(default)]
    explanation: Option<String>,
}

impl TryFrom<QuestionFields> for QuizQuestion {
    type Error = StudyError;

    fn try_from(fields: QuestionFields) -> Result<Self> {
        Self::new(
            fields.question,
            fields.options,
            fields.correct_index,
            fields.difficulty,
            fields.explanation,
        )
    }
}

impl QuizQuestion {
    /// Validate and build a question. Text is trimmed; nothing else is corrected.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InvalidInput`] naming the violated invariant.
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        difficulty: Difficulty,
        explanation: Option<String>,
    ) -> Result<Self> {
        let question = question.into().trim().to_string();
        if question.is_empty() {
            return Err(StudyError::InvalidInput("question text is empty".to_string()));
        }
        let options: Vec<String> = options.into_iter().map(|o| o.trim().to_string()).collect();
        let options: [String; OPTION_COUNT] = options.try_into().map_err(|o: Vec<String>| {
            StudyError::InvalidInput(format!("expected {OPTION_COUNT} options, got {}", o.len()))
        })?;
        if options.iter().any(String::is_empty) {
            return Err(StudyError::InvalidInput("option text is empty".to_string()));
        }
        for (i, a) in options.iter().enumerate() {
            if options[i + 1..].iter().any(|b| a.eq_ignore_ascii_case(b)) {
                return Err(StudyError::InvalidInput(format!("duplicate option '{a}'")));
            }
        }
        if correct_index >= OPTION_COUNT {
            return Err(StudyError::InvalidInput(format!(
                "correct option index {correct_index} out of range"
            )));
        }
        let explanation = explanation.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());

        Ok(Self { question, options, correct_index, difficulty, explanation })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    fn stem_key(&self) -> String {
        self.question.to_lowercase()
    }
}

/// States of one quiz-generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStage {
    Requested,
    ContextRetrieved,
    GeneratedRaw,
    Parsed,
    Validated,
    RepairAttempted,
    Ready,
    Failed,
}

/// What happened while generating a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizReport {
    pub requested: usize,
    pub delivered: usize,
    /// Decoded objects that violated the question invariants or did not decode.
    pub malformed_count: usize,
    /// Valid questions dropped because their stem was already accepted.
    pub duplicate_count: usize,
    pub repair_attempted: bool,
    /// Stages visited, in order.
    pub stages: Vec<QuizStage>,
}

impl QuizReport {
    /// Questions requested but not delivered.
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.delivered)
    }

    /// Whether every requested question was delivered.
    pub fn is_complete(&self) -> bool {
        self.shortfall() == 0
    }
}

/// Parameters of a quiz-generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRequest {
    pub topic: String,
    pub count: usize,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl QuizRequest {
    pub fn new(topic: impl Into<String>, count: usize, difficulty: Difficulty) -> Self {
        Self { topic: topic.into(), count, difficulty }
    }
}

/// A generated quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub topic: String,
    pub difficulty: Difficulty,
    pub questions: Vec<QuizQuestion>,
    /// Filenames of the documents the context came from.
    pub sources: Vec<String>,
    pub report: QuizReport,
}

/// Generates quizzes from retrieved context and grades submissions.
#[derive(Clone)]
pub struct QuizEngine {
    retriever: Retriever,
    completion: CompletionGateway,
    options: CompletionOptions,
    top_k: usize,
    context_char_budget: usize,
    question_bounds: (usize, usize),
}

impl QuizEngine {
    pub fn new(
        retriever: Retriever,
        completion: CompletionGateway,
        options: CompletionOptions,
        top_k: usize,
        context_char_budget: usize,
        question_bounds: (usize, usize),
    ) -> Self {
        Self { retriever, completion, options, top_k, context_char_budget, question_bounds }
    }

    /// Generate a quiz for `request`.
    ///
    /// # Errors
    ///
    /// - [`StudyError::InvalidInput`] for a blank topic or an out-of-bounds count
    /// - [`StudyError::InsufficientContext`] when nothing relates to the topic;
    ///   the completion gateway is not called
    /// - [`StudyError::GenerationFormat`] when no valid question survives the
    ///   repair attempt
    /// - a gateway error if the first generation call fails
    pub async fn generate(&self, request: &QuizRequest) -> Result<Quiz> {
        let mut stages = vec![QuizStage::Requested];
        let topic = request.topic.trim();
        let (min, max) = self.question_bounds;
        if topic.is_empty() {
            return Err(StudyError::InvalidInput("quiz topic must not be empty".to_string()));
        }
        if !(min..=max).contains(&request.count) {
            return Err(StudyError::InvalidInput(format!(
                "question count {} outside {min}..={max}",
                request.count
            )));
        }

        let hits = self.retriever.retrieve(topic, self.top_k).await?;
        if hits.is_empty() {
            warn!(topic, stage = ?QuizStage::Failed, "no context for quiz topic");
            return Err(StudyError::InsufficientContext(format!(
                "no indexed content relates to '{topic}'"
            )));
        }
        stages.push(QuizStage::ContextRetrieved);
        let chunks: Vec<_> = hits.into_iter().map(|hit| hit.chunk).collect();
        let packed = prompts::plain_context(&chunks, self.context_char_budget);
        let sources = unique_sources(&chunks[..packed.chunk_count]);
        let context = packed.text;

        let raw = self.request_questions(request.count, request.difficulty, &context, &[]).await?;
        stages.push(QuizStage::GeneratedRaw);
        let mut raw_outputs = vec![raw];

        let mut accepted = Vec::new();
        let mut report = QuizReport {
            requested: request.count,
            delivered: 0,
            malformed_count: 0,
            duplicate_count: 0,
            repair_attempted: false,
            stages: Vec::new(),
        };
        absorb(&mut accepted, &mut report, parse_quiz_output(&raw_outputs[0], request.difficulty));
        stages.extend([QuizStage::Parsed, QuizStage::Validated]);
        debug!(topic, valid = accepted.len(), malformed = report.malformed_count, "first pass parsed");

        if accepted.len() < request.count {
            let missing = request.count - accepted.len();
            stages.push(QuizStage::RepairAttempted);
            report.repair_attempted = true;
            warn!(topic, missing, "quiz short after first pass, attempting repair");

            let stems: Vec<&str> = accepted.iter().map(QuizQuestion::question).collect();
            match self.request_questions(missing, request.difficulty, &context, &stems).await {
                Ok(raw) => {
                    absorb(&mut accepted, &mut report, parse_quiz_output(&raw, request.difficulty));
                    raw_outputs.push(raw);
                    stages.extend([QuizStage::Parsed, QuizStage::Validated]);
                }
                Err(e) if !accepted.is_empty() => {
                    warn!(topic, error = %e, "repair generation failed, keeping partial quiz");
                }
                Err(e) => return Err(e),
            }
        }

        accepted.truncate(request.count);
        if accepted.is_empty() {
            let raw_output = raw_outputs.join("\n---\n");
            error!(topic, stage = ?QuizStage::Failed, raw_output = %raw_output, "no valid quiz questions");
            return Err(StudyError::GenerationFormat {
                message: format!(
                    "model output contained no valid questions ({} malformed)",
                    report.malformed_count
                ),
                raw_output,
            });
        }

        stages.push(QuizStage::Ready);
        report.delivered = accepted.len();
        report.stages = stages;
        if !report.is_complete() {
            warn!(topic, shortfall = report.shortfall(), "returning partial quiz");
        }
        info!(topic, delivered = report.delivered, requested = report.requested, "quiz generated");

        Ok(Quiz {
            topic: topic.to_string(),
            difficulty: request.difficulty,
            questions: accepted,
            sources,
            report,
        })
    }

    /// Grade a submission; see [`grade`].
    pub fn grade(&self, quiz: &Quiz, submitted: &[Option<usize>]) -> Result<GradedResult> {
        grade(quiz, submitted)
    }

    async fn request_questions(
        &self,
        count: usize,
        difficulty: Difficulty,
        context: &str,
        avoid: &[&str],
    ) -> Result<String> {
        let avoid = if avoid.is_empty() {
            String::new()
        } else {
            let listed: Vec<String> = avoid.iter().map(|s| format!("- {s}")).collect();
            format!("Do not repeat any of these questions:\n{}\n", listed.join("\n"))
        };
        let count = count.to_string();
        let difficulty = difficulty.to_string();
        let prompt = prompts::render(
            QUIZ_TEMPLATE,
            &[
                ("count", count.as_str()),
                ("difficulty", difficulty.as_str()),
                ("avoid", avoid.as_str()),
                ("context", context),
            ],
        );
        self.completion.complete(&prompt, &self.options).await
    }
}

/// Merge parsed questions, skipping stems already accepted.
fn absorb(accepted: &mut Vec<QuizQuestion>, report: &mut QuizReport, parsed: ParsedQuiz) {
    report.malformed_count += parsed.malformed_count;
    for question in parsed.questions {
        let key = question.stem_key();
        if accepted.iter().any(|q| q.stem_key() == key) {
            report.duplicate_count += 1;
            continue;
        }
        accepted.push(question);
    }
}
