//! Fixed prompt templates.
//!
//! Templates are constants filled by plain placeholder substitution, so the
//! same inputs always produce the same prompt.

use crate::document::Chunk;
use crate::summarize::SummaryFormat;

/// Text returned instead of a generated answer when nothing was retrieved.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str = "I couldn't find relevant information in your study \
    materials to answer this. Try adding more documents on this topic.";

pub(crate) const QA_TEMPLATE: &str = "You are a helpful tutoring assistant. Answer the student's \
question using ONLY the context provided below.

Rules:
1. If the answer is in the context, provide a clear explanation.
2. If the answer is NOT in the context, say \"I don't have enough information from your materials to answer this.\"
3. Keep answers concise but complete.
4. Refer to the context blocks by their markers, e.g. [1].

Context:
{context}

Question: {question}

Answer:";

pub(crate) const SUMMARY_BULLETS_TEMPLATE: &str = "Summarize the following study material as 5-7 \
bullet points. Each bullet starts with \"- \" and states one key idea.

Content:
{context}

Summary:";

pub(crate) const SUMMARY_SHORT_TEMPLATE: &str = "Summarize the following study material in 2-3 \
sentences covering only the most important ideas.

Content:
{context}

Summary:";

pub(crate) const SUMMARY_DETAILED_TEMPLATE: &str = "Write a comprehensive summary of the following \
study material as one or more well-structured paragraphs. Cover every major concept and how the \
concepts relate.

Content:
{context}

Summary:";

pub(crate) const SUMMARY_SIMPLIFIED_TEMPLATE: &str = "Explain the following study material as if \
to a 15 year old. Use simple words, short sentences and everyday examples.

Content:
{context}

Summary:";

pub(crate) const QUIZ_TEMPLATE: &str = "Generate exactly {count} multiple-choice questions from \
this content. Difficulty: {difficulty}.
{avoid}
Content:
{context}

IMPORTANT: Return ONLY valid JSON with no extra text. Every question has exactly four distinct \
options. Use this exact format:

{
  \"questions\": [
    {
      \"question\": \"What is X?\",
      \"options\": {\"A\": \"option 1\", \"B\": \"option 2\", \"C\": \"option 3\", \"D\": \"option 4\"},
      \"correct_answer\": \"A\",
      \"explanation\": \"Brief explanation\"
    }
  ]
}

JSON:";

pub(crate) const DEFINITIONS_TEMPLATE: &str = "Extract all key definitions and terms from this \
content.

Content:
{context}

Format each as two lines, with a blank line between entries:
Term: [term name]
Definition: [clear definition]

List:";

/// Fill `{name}` placeholders in `template` in a single pass.
///
/// Substituted values are never rescanned, and braces that do not enclose a
/// known name are copied through unchanged.
pub(crate) fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let known = after.find('}').and_then(|close| {
            let name = &after[..close];
            values.iter().find(|(n, _)| *n == name).map(|(_, value)| (close, *value))
        });
        match known {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub(crate) fn summary_template(format: SummaryFormat) -> &'static str {
    match format {
        SummaryFormat::Bullets => SUMMARY_BULLETS_TEMPLATE,
        SummaryFormat::Short => SUMMARY_SHORT_TEMPLATE,
        SummaryFormat::Detailed => SUMMARY_DETAILED_TEMPLATE,
        SummaryFormat::Simplified => SUMMARY_SIMPLIFIED_TEMPLATE,
    }
}

/// Context assembled from whole chunks.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PackedContext {
    pub text: String,
    /// How many leading chunks made it into `text`.
    pub chunk_count: usize,
}

/// Join chunk texts with blank lines, keeping only whole chunks that fit in
/// `char_budget` characters.
pub(crate) fn plain_context<'a>(
    chunks: impl IntoIterator<Item = &'a Chunk>,
    char_budget: usize,
) -> PackedContext {
    pack(chunks.into_iter().map(|c| c.text.trim().to_string()), char_budget)
}

/// Label each chunk with its citation marker and origin, keeping only whole
/// labelled chunks that fit in `char_budget` characters.
pub(crate) fn labelled_context<'a>(
    chunks: impl IntoIterator<Item = &'a Chunk>,
    char_budget: usize,
) -> PackedContext {
    let blocks = chunks.into_iter().enumerate().map(|(i, c)| {
        format!("[{}] (Source: {}, Page: {})\n{}", i + 1, c.source, c.page, c.text.trim())
    });
    pack(blocks, char_budget)
}

/// The first block is always kept, cut to the budget if it is too long.
fn pack(blocks: impl Iterator<Item = String>, char_budget: usize) -> PackedContext {
    let mut text = String::new();
    let mut used = 0;
    let mut chunk_count = 0;
    for block in blocks {
        let len = block.chars().count();
        if chunk_count == 0 {
            text = truncate_chars(&block, char_budget);
            used = len.min(char_budget);
            chunk_count = 1;
            continue;
        }
        if used + PARAGRAPH_BREAK.len() + len > char_budget {
            break;
        }
        text.push_str(PARAGRAPH_BREAK);
        text.push_str(&block);
        used += PARAGRAPH_BREAK.len() + len;
        chunk_count += 1;
    }
    PackedContext { text, chunk_count }
}

const PARAGRAPH_BREAK: &str = "\n\n";

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}
