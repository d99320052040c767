//! Tolerant decoding of model-produced quiz JSON.
//!
//! Models wrap JSON in code fences, add commentary and run out of tokens
//! mid-object. The parser locates the question array, splits it into
//! top-level objects with a string-aware brace scanner and decodes each
//! object on its own, so one bad question never costs the others.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use super::{Difficulty, OPTION_COUNT, QuizQuestion};

/// Questions recovered from one model output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuiz {
    pub questions: Vec<QuizQuestion>,
    /// Objects that failed to decode or validate, including a truncated tail.
    pub malformed_count: usize,
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(alias = "stem", alias = "prompt")]
    question: String,
    #[serde(alias = "choices")]
    options: RawOptions,
    #[serde(alias = "answer", alias = "correct")]
    correct_answer: RawAnswer,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOptions {
    List(Vec<String>),
    Labelled(BTreeMap<String, String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    Index(u64),
    Text(String),
}

/// Recover every valid question from `raw`.
///
/// Never fails: an output with no recoverable question yields an empty
/// [`ParsedQuiz`] whose `malformed_count` says how many objects were rejected.
pub fn parse_quiz_output(raw: &str, difficulty: Difficulty) -> ParsedQuiz {
    let body = strip_code_fence(raw);
    let region = question_region(body);
    let (objects, truncated) = split_objects(region);

    let mut parsed = ParsedQuiz { questions: Vec::new(), malformed_count: usize::from(truncated) };
    for object in objects {
        match decode(object, difficulty) {
            Some(question) => parsed.questions.push(question),
            None => parsed.malformed_count += 1,
        }
    }
    debug!(
        valid = parsed.questions.len(),
        malformed = parsed.malformed_count,
        truncated,
        "quiz output parsed"
    );
    parsed
}

fn decode(object: &str, difficulty: Difficulty) -> Option<QuizQuestion> {
    let raw: RawQuestion = match serde_json::from_str(object) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "undecodable quiz object");
            return None;
        }
    };

    let (labels, options) = match raw.options {
        RawOptions::List(options) => (Vec::new(), options),
        RawOptions::Labelled(map) => {
            let (labels, options): (Vec<String>, Vec<String>) =
                map.into_iter().map(|(label, text)| (normalize_label(&label), text)).unzip();
            (labels, options)
        }
    };
    if options.len() != OPTION_COUNT {
        debug!(option_count = options.len(), "quiz object has wrong option count");
        return None;
    }

    let correct_index = resolve_answer(&raw.correct_answer, &labels, &options)?;
    QuizQuestion::new(raw.question, options, correct_index, difficulty, raw.explanation)
        .map_err(|e| debug!(error = %e, "quiz object failed validation"))
        .ok()
}

/// Map the model's answer onto an option index.
///
/// Accepts a zero-based index, an option label (`"B"`, `"b)"`, `"B) text"`),
/// or the full option text.
fn resolve_answer(answer: &RawAnswer, labels: &[String], options: &[String]) -> Option<usize> {
    let text = match answer {
        RawAnswer::Index(i) => {
            return usize::try_from(*i).ok().filter(|i| *i < OPTION_COUNT);
        }
        RawAnswer::Text(text) => text.trim(),
    };
    if text.is_empty() {
        return None;
    }

    let label = normalize_label(text);
    if let Some(i) = labels.iter().position(|l| *l == label) {
        return Some(i);
    }
    if let Some(i) = options.iter().position(|o| o.trim().eq_ignore_ascii_case(text)) {
        return Some(i);
    }
    letter_index(text)
}

/// `"B"`, `"b."`, `"B) Paris"` and `"(B)"` all name option index 1.
fn letter_index(text: &str) -> Option<usize> {
    let text = text.trim_start_matches('(');
    let mut chars = text.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let rest = chars.as_str();
    let delimited = rest.is_empty() || rest.starts_with([')', '.', ':', ' ']);
    match letter {
        'A'..='D' if delimited => Some(letter as usize - 'A' as usize),
        _ => None,
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().trim_matches(['(', ')', '.', ':']).trim().to_ascii_uppercase()
}

/// The first fenced block that looks like JSON, or the whole text.
fn strip_code_fence(raw: &str) -> &str {
    if !raw.contains("```") {
        return raw.trim();
    }
    for block in raw.split("```").skip(1).step_by(2) {
        if !block.contains('{') {
            continue;
        }
        let block = match block.find('\n') {
            Some(newline) if !block[..newline].contains('{') => &block[newline + 1..],
            _ => block,
        };
        return block.trim();
    }
    raw.trim()
}

/// The text after the opening bracket of the question array.
///
/// Prefers the array under a `"questions"` key, then a bracket that opens
/// before any object. Otherwise the whole text is scanned for loose objects,
/// which covers a single bare question whose options list holds the first
/// bracket.
fn question_region(text: &str) -> &str {
    if let Some(key) = text.find("\"questions\"") {
        if let Some(open) = text[key..].find('[') {
            return &text[key + open + 1..];
        }
    }
    let first_object = text.find('{').unwrap_or(text.len());
    match text.find('[') {
        Some(open) if open < first_object => &text[open + 1..],
        _ => text,
    }
}

/// Split `region` into complete top-level JSON objects.
///
/// Scanning stops at the array's closing bracket. Returns the objects and
/// whether an object was left unterminated.
fn split_objects(region: &str) -> (Vec<&str>, bool) {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in region.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' | '[' => {
                if depth == 0 {
                    if c == '[' {
                        continue;
                    }
                    start = Some(i);
                }
                depth += 1;
            }
            '}' | ']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        objects.push(&region[s..=i]);
                    }
                }
            }
            ']' => break,
            _ => {}
        }
    }

    (objects, start.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{
      "questions": [
        {
          "question": "What do plants absorb for photosynthesis?",
          "options": {"A": "Oxygen", "B": "Carbon dioxide", "C": "Nitrogen", "D": "Helium"},
          "correct_answer": "B",
          "explanation": "Plants take in CO2."
        },
        {
          "question": "Where does photosynthesis occur?",
          "options": ["Mitochondria", "Nucleus", "Chloroplasts", "Ribosomes"],
          "correct_answer": "C) Chloroplasts"
        }
      ]
    }"#;

    #[test]
    fn parses_labelled_and_listed_options() {
        let parsed = parse_quiz_output(WELL_FORMED, Difficulty::Medium);
        assert_eq!(parsed.malformed_count, 0);
        assert_eq!(parsed.questions.len(), 2);
        assert_eq!(parsed.questions[0].correct_option(), "Carbon dioxide");
        assert_eq!(parsed.questions[0].explanation(), Some("Plants take in CO2."));
        assert_eq!(parsed.questions[1].correct_index(), 2);
        assert_eq!(parsed.questions[1].difficulty(), Difficulty::Medium);
    }

    #[test]
    fn strips_code_fences_and_commentary() {
        let raw = format!("Sure! Here is your quiz:\n```json\n{WELL_FORMED}\n```\nGood luck!");
        let parsed = parse_quiz_output(&raw, Difficulty::Easy);
        assert_eq!(parsed.questions.len(), 2);
    }

    #[test]
    fn drops_truncated_tail_and_keeps_complete_objects() {
        let raw = r#"{"questions": [
          {"question": "Q1?", "options": ["a", "b", "c", "d"], "correct_answer": "A"},
          {"question": "Q2?", "options": ["a", "b", "c", "d"], "correct_answer": "B"},
          {"question": "Q3?", "options": ["a", "b", "c""#;
        let parsed = parse_quiz_output(raw, Difficulty::Hard);
        assert_eq!(parsed.questions.len(), 2);
        assert_eq!(parsed.malformed_count, 1);
    }

    #[test]
    fn braces_inside_strings_do_not_split_objects() {
        let raw = r#"[{"question": "Which set is {x | x > 0}?", "options": ["a", "b", "c", "d"], "correct_answer": "D", "explanation": "closing } and \" quote"}]"#;
        let parsed = parse_quiz_output(raw, Difficulty::Easy);
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].question(), "Which set is {x | x > 0}?");
    }

    #[test]
    fn invalid_objects_are_counted_not_fatal() {
        let raw = r#"[
          {"question": "Three options?", "options": ["a", "b", "c"], "correct_answer": "A"},
          {"question": "Duplicate options?", "options": ["a", "a", "c", "d"], "correct_answer": "A"},
          {"question": "Bad answer?", "options": ["a", "b", "c", "d"], "correct_answer": "E"},
          {"question": "Good?", "options": ["a", "b", "c", "d"], "correct_answer": 3}
        ]"#;
        let parsed = parse_quiz_output(raw, Difficulty::Easy);
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].correct_index(), 3);
        assert_eq!(parsed.malformed_count, 3);
    }

    #[test]
    fn answer_may_be_option_text() {
        let raw = r#"[{"question": "Capital of France?", "options": ["Berlin", "Paris", "Rome", "Madrid"], "correct_answer": "paris"}]"#;
        let parsed = parse_quiz_output(raw, Difficulty::Easy);
        assert_eq!(parsed.questions[0].correct_index(), 1);
    }

    #[test]
    fn single_bare_object_is_recovered() {
        let raw = r#"Here is one more question:
        {"question": "What gas do plants release?", "options": ["Oxygen", "Argon", "Neon", "Radon"], "correct_answer": "A"}"#;
        let parsed = parse_quiz_output(raw, Difficulty::Easy);
        assert_eq!(parsed.malformed_count, 0);
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].correct_option(), "Oxygen");
    }

    #[test]
    fn loose_objects_without_an_array_are_all_recovered() {
        let raw = r#"{"question": "Q1?", "options": ["a", "b", "c", "d"], "correct_answer": "A"}
        {"question": "Q2?", "options": ["a", "b", "c", "d"], "correct_answer": "B"}"#;
        let parsed = parse_quiz_output(raw, Difficulty::Easy);
        assert_eq!(parsed.questions.len(), 2);
    }

    #[test]
    fn prose_yields_nothing() {
        let parsed = parse_quiz_output("I cannot create a quiz from this.", Difficulty::Easy);
        assert!(parsed.questions.is_empty());
        assert_eq!(parsed.malformed_count, 0);
    }

    #[test]
    fn letter_index_requires_delimiter() {
        assert_eq!(letter_index("b"), Some(1));
        assert_eq!(letter_index("(C)"), Some(2));
        assert_eq!(letter_index("D: Helium"), Some(3));
        assert_eq!(letter_index("Carbon"), None);
    }
}
