//! Term/definition extraction.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::completion::CompletionOptions;
use crate::document::Chunk;
use crate::error::Result;
use crate::gateway::CompletionGateway;
use crate::prompts::{self, DEFINITIONS_TEMPLATE};
use crate::retriever::{Retriever, unique_sources};

/// One extracted term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionEntry {
    pub term: String,
    pub definition: String,
    /// Id of the first context chunk that mentions the term.
    pub source_chunk: Option<String>,
}

/// Extracted definitions keyed by normalized term.
///
/// Keys are lowercase with whitespace runs collapsed, so `"Cell  Wall"` and
/// `"cell wall"` are the same term. Inserting an existing term replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definitions {
    entries: BTreeMap<String, DefinitionEntry>,
    /// Pairs discarded for a missing term or an empty definition.
    pub malformed_count: usize,
    pub sources: Vec<String>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry`, returning the entry it replaced.
    pub fn insert(&mut self, entry: DefinitionEntry) -> Option<DefinitionEntry> {
        self.entries.insert(normalize_term(&entry.term), entry)
    }

    pub fn get(&self, term: &str) -> Option<&DefinitionEntry> {
        self.entries.get(&normalize_term(term))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in normalized-term order.
    pub fn iter(&self) -> btree_map::Values<'_, String, DefinitionEntry> {
        self.entries.values()
    }
}

impl<'a> IntoIterator for &'a Definitions {
    type Item = &'a DefinitionEntry;
    type IntoIter = btree_map::Values<'a, String, DefinitionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lowercase `term` and collapse its whitespace.
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Parse `Term: ...` / `Definition: ...` pairs out of model output.
///
/// Bullets, numbering, markdown bold and headings around the labels are
/// ignored, as are lines that belong to no pair. A definition may wrap onto
/// following lines until a blank line. Pairs with an empty term or
/// definition are discarded and counted; a repeated term keeps its last
/// definition. `source_chunk` is left unset.
pub fn parse_definitions(raw: &str) -> Definitions {
    let mut definitions = Definitions::new();
    let mut term: Option<String> = None;
    let mut open: Option<DefinitionEntry> = None;

    for line in raw.lines() {
        let line = clean_line(line);
        if line.is_empty() {
            close(&mut open, &mut definitions);
            continue;
        }

        if let Some(rest) = strip_label(&line, "term") {
            close(&mut open, &mut definitions);
            if term.replace(rest.to_string()).is_some() {
                // A term with no definition.
                definitions.malformed_count += 1;
            }
        } else if let Some(rest) = strip_label(&line, "definition") {
            close(&mut open, &mut definitions);
            match term.take() {
                Some(t) if !t.is_empty() && !rest.is_empty() => {
                    open = Some(DefinitionEntry {
                        term: t,
                        definition: rest.to_string(),
                        source_chunk: None,
                    });
                }
                _ => definitions.malformed_count += 1,
            }
        } else if let Some(entry) = open.as_mut() {
            entry.definition.push(' ');
            entry.definition.push_str(&line);
        }
    }
    close(&mut open, &mut definitions);
    if term.is_some() {
        definitions.malformed_count += 1;
    }
    definitions
}

fn close(open: &mut Option<DefinitionEntry>, definitions: &mut Definitions) {
    if let Some(entry) = open.take() {
        definitions.insert(entry);
    }
}

fn clean_line(line: &str) -> String {
    let line = line.replace("**", "").replace("__", "");
    let line = line.trim().trim_start_matches('#').trim_start();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let line = if digits > 0 && line[digits..].starts_with(['.', ')']) {
        line[digits + 1..].trim_start()
    } else {
        line
    };
    line.trim_end().to_string()
}

/// The text after `label:` when `line` starts with that label, ignoring case.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    line[label.len()..].trim_start().strip_prefix(':').map(str::trim)
}

/// Extracts a glossary from retrieved or corpus-wide context.
#[derive(Clone)]
pub struct DefinitionExtractor {
    retriever: Retriever,
    completion: CompletionGateway,
    options: CompletionOptions,
    top_k: usize,
    context_char_budget: usize,
}

impl DefinitionExtractor {
    pub fn new(
        retriever: Retriever,
        completion: CompletionGateway,
        options: CompletionOptions,
        top_k: usize,
        context_char_budget: usize,
    ) -> Self {
        Self { retriever, completion, options, top_k, context_char_budget }
    }

    /// Extract definitions for `topic`, or from the whole corpus.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::InsufficientContext`](crate::StudyError::InsufficientContext)
    /// when there is no context, or a gateway error.
    pub async fn extract(&self, topic: Option<&str>) -> Result<Definitions> {
        let chunks =
            self.retriever.gather_context(topic, self.top_k, self.context_char_budget).await?;
        let context = prompts::plain_context(&chunks, self.context_char_budget);
        let chunks = &chunks[..context.chunk_count];
        let prompt = prompts::render(DEFINITIONS_TEMPLATE, &[("context", context.text.as_str())]);
        let raw = self.completion.complete(&prompt, &self.options).await?;

        let mut definitions = parse_definitions(&raw);
        attach_source_chunks(&mut definitions, chunks);
        definitions.sources = unique_sources(chunks);

        if definitions.malformed_count > 0 {
            warn!(malformed = definitions.malformed_count, "discarded malformed definition pairs");
        }
        info!(
            topic = topic.unwrap_or(""),
            term_count = definitions.len(),
            "definitions extracted"
        );
        Ok(definitions)
    }
}

fn attach_source_chunks(definitions: &mut Definitions, chunks: &[Chunk]) {
    let haystacks: Vec<(String, &str)> =
        chunks.iter().map(|c| (normalize_term(&c.text), c.id.as_str())).collect();
    for (key, entry) in definitions.entries.iter_mut() {
        entry.source_chunk = haystacks
            .iter()
            .find(|(text, _)| text.contains(key.as_str()))
            .map(|(_, id)| id.to_string());
    }
}
