//! Deterministic fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use study_rag::{
    CompletionOptions, CompletionProvider, EmbeddingProvider, InMemoryVectorIndex, Result,
    StudyConfig, StudyError, StudyPipeline,
};

/// Words the fake embedder knows. Text using none of them embeds to zero.
pub const VOCABULARY: &[&str] = &[
    "photosynthesis",
    "plant",
    "plants",
    "light",
    "energy",
    "chlorophyll",
    "glucose",
    "oxygen",
    "carbon",
    "dioxide",
    "water",
    "leaf",
    "leaves",
    "chloroplast",
    "chloroplasts",
    "sunlight",
    "respiration",
    "mitochondria",
    "cell",
    "atp",
    "gravity",
    "planet",
    "orbit",
    "mass",
];

/// Bag-of-words embedder over [`VOCABULARY`].
#[derive(Default)]
pub struct VocabularyEmbedder {
    pub calls: AtomicUsize,
}

impl VocabularyEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; VOCABULARY.len()];
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            let token = token.to_lowercase();
            if let Some(i) = VOCABULARY.iter().position(|w| *w == token) {
                vector[i] += 1.0;
            }
        }
        vector
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len()
    }

    fn name(&self) -> &str {
        "vocabulary"
    }
}

/// Completion provider that replays queued responses and records prompts.
///
/// Once the queue is empty every call returns `fallback`.
pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<Result<String>>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.responses.lock().unwrap().extend(responses.into_iter().map(|r| Ok(r.into())));
        self
    }

    pub fn push_error(&self, message: &str) {
        self.responses.lock().unwrap().push_back(Err(StudyError::Completion {
            provider: "scripted".into(),
            message: message.into(),
        }));
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A pipeline over a fresh in-memory index.
pub fn pipeline(config: StudyConfig, completion: Arc<ScriptedCompletion>) -> StudyPipeline {
    pipeline_with_embedder(config, Arc::new(VocabularyEmbedder::default()), completion)
}

pub fn pipeline_with_embedder(
    config: StudyConfig,
    embedder: Arc<VocabularyEmbedder>,
    completion: Arc<ScriptedCompletion>,
) -> StudyPipeline {
    StudyPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .completion_provider(completion)
        .index(Arc::new(InMemoryVectorIndex::new()))
        .build()
        .unwrap()
}

/// Route `tracing` output through the test harness; `RUST_LOG` selects levels.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `count` well-formed questions in the JSON shape the quiz prompt asks for.
pub fn quiz_json(stems: &[&str]) -> String {
    let questions: Vec<String> = stems
        .iter()
        .map(|stem| {
            format!(
                r#"{{"question": "{stem}", "options": {{"A": "Oxygen", "B": "Glucose", "C": "Nitrogen", "D": "Helium"}}, "correct_answer": "B", "explanation": "From the notes."}}"#
            )
        })
        .collect();
    format!(r#"{{"questions": [{}]}}"#, questions.join(", "))
}

pub const PHOTOSYNTHESIS_PAGE_ONE: &str = "Photosynthesis is the process by which plants convert \
light energy into chemical energy. It takes place in the chloroplasts of plant cells, where the \
green pigment chlorophyll absorbs sunlight.\n\nDuring photosynthesis plants take in carbon \
dioxide from the air and water from the soil. Using light energy they turn these into glucose, \
a sugar that stores energy, and release oxygen as a by-product.";

pub const PHOTOSYNTHESIS_PAGE_TWO: &str = "The light-dependent reactions happen in the thylakoid \
membranes and produce ATP. The Calvin cycle then uses that ATP to fix carbon dioxide into \
glucose.\n\nWithout photosynthesis there would be almost no oxygen in the atmosphere, and most \
food chains would collapse, because plants are the primary producers.";
