//! End-to-end behaviour of the study pipeline with deterministic fakes.

mod common;

use std::sync::Arc;

use study_rag::{
    Document, INSUFFICIENT_CONTEXT_ANSWER, StudyConfig, StudyError, SummaryFormat,
};

use common::{
    PHOTOSYNTHESIS_PAGE_ONE, PHOTOSYNTHESIS_PAGE_TWO, ScriptedCompletion, VocabularyEmbedder,
};

fn scenario_config() -> StudyConfig {
    StudyConfig::builder().chunk_size(500).chunk_overlap(50).build().unwrap()
}

fn photosynthesis_document() -> Document {
    Document::new(
        "photosynthesis.pdf",
        vec![PHOTOSYNTHESIS_PAGE_ONE.to_string(), PHOTOSYNTHESIS_PAGE_TWO.to_string()],
    )
}

#[tokio::test]
async fn answer_on_empty_index_never_calls_the_model() {
    common::init_tracing();
    let completion = Arc::new(ScriptedCompletion::new("should not be used"));
    let embedder = Arc::new(VocabularyEmbedder::default());
    let pipeline =
        common::pipeline_with_embedder(StudyConfig::default(), embedder.clone(), completion.clone());

    let answer = pipeline.answer("What is photosynthesis?", 5).await.unwrap();

    assert_eq!(answer.text, INSUFFICIENT_CONTEXT_ANSWER);
    assert!(answer.citations.is_empty());
    assert!(!answer.grounded);
    assert_eq!(completion.calls(), 0);
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn photosynthesis_question_is_answered_with_citations() {
    common::init_tracing();
    let completion = Arc::new(ScriptedCompletion::new(
        "Photosynthesis converts light energy into chemical energy [1].",
    ));
    let pipeline = common::pipeline(scenario_config(), completion.clone());
    let document = photosynthesis_document();
    let (text, _) = document.assemble();

    let chunks = pipeline.ingest(&document).await.unwrap();
    assert!(chunks.iter().all(|c| c.embedding.is_some()));

    let hits = pipeline.retrieve("What is photosynthesis?", 3).await.unwrap();
    assert!(!hits.is_empty() && hits.len() <= 3);
    let top = &hits[0].chunk;
    assert_eq!(top.document_id, document.id);
    assert!(top.start < top.end && top.end <= text.len());
    assert_eq!(top.text, text[top.start..top.end]);

    let answer = pipeline.answer("What is photosynthesis?", 3).await.unwrap();
    assert!(answer.grounded);
    assert!(answer.text.contains("light energy"));
    assert!(!answer.citations.is_empty());
    assert!(answer.citations.iter().all(|c| c.document_id == document.id));
    assert_eq!(answer.citations[0].marker, 1);
    assert_eq!(completion.calls(), 1);

    let prompt = &completion.prompts()[0];
    assert!(prompt.contains("Question: What is photosynthesis?"));
    assert!(prompt.contains("[1] (Source: photosynthesis.pdf, Page: "));
}

#[tokio::test]
async fn citations_cover_only_chunks_that_fit_the_context_budget() {
    let completion = Arc::new(ScriptedCompletion::new("Plants turn light into glucose [1]."));
    let config = StudyConfig::builder()
        .chunk_size(200)
        .chunk_overlap(20)
        .min_chunk_size(50)
        .context_char_budget(300)
        .build()
        .unwrap();
    let pipeline = common::pipeline(config, completion.clone());
    pipeline.ingest(&photosynthesis_document()).await.unwrap();

    let question = "How do plants use light energy to make glucose and oxygen?";
    let hits = pipeline.retrieve(question, 5).await.unwrap();
    assert!(hits.len() > 1, "expected several relevant chunks");

    let answer = pipeline.answer(question, 5).await.unwrap();
    let prompt = &completion.prompts()[0];

    assert!(!answer.citations.is_empty());
    assert!(answer.citations.len() < hits.len());
    for citation in &answer.citations {
        assert!(prompt.contains(&format!("[{}] (Source: ", citation.marker)));
    }
    assert!(!prompt.contains(&format!("[{}] (Source: ", answer.citations.len() + 1)));
    assert_eq!(prompt.matches("(Source: ").count(), answer.citations.len());
}

#[tokio::test]
async fn citation_pages_count_blank_source_pages() {
    let completion = Arc::new(ScriptedCompletion::new("ATP comes from the light reactions [1]."));
    let config = StudyConfig::builder().chunk_size(500).chunk_overlap(0).build().unwrap();
    let pipeline = common::pipeline(config, completion.clone());
    let document = Document::new(
        "scan.pdf",
        vec![
            PHOTOSYNTHESIS_PAGE_ONE.to_string(),
            "   \n ".to_string(),
            PHOTOSYNTHESIS_PAGE_TWO.to_string(),
        ],
    );
    pipeline.ingest(&document).await.unwrap();

    let answer = pipeline.answer("What produces ATP?", 3).await.unwrap();

    assert!(answer.grounded);
    assert_eq!(answer.citations[0].page, 3);
    assert!(completion.prompts()[0].contains("[1] (Source: scan.pdf, Page: 3)"));
}

#[tokio::test]
async fn unrelated_question_gets_insufficient_context_answer() {
    let completion = Arc::new(ScriptedCompletion::new("unused"));
    let pipeline = common::pipeline(scenario_config(), completion.clone());
    pipeline.ingest(&photosynthesis_document()).await.unwrap();

    let answer = pipeline.answer("Who built medieval castles?", 3).await.unwrap();
    assert!(!answer.grounded);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn answer_rejects_blank_question_and_zero_k() {
    let pipeline = common::pipeline(scenario_config(), Arc::new(ScriptedCompletion::new("x")));
    assert!(matches!(pipeline.answer("   ", 3).await, Err(StudyError::InvalidInput(_))));
    assert!(matches!(pipeline.answer("light?", 0).await, Err(StudyError::InvalidInput(_))));
}

#[tokio::test]
async fn batch_ingestion_reports_each_document() {
    let pipeline = common::pipeline(scenario_config(), Arc::new(ScriptedCompletion::new("x")));
    let documents = vec![
        Document::from_text("good.txt", PHOTOSYNTHESIS_PAGE_ONE),
        Document::from_text("blank.txt", "  \n\n  "),
        Document::from_text("also-good.txt", PHOTOSYNTHESIS_PAGE_TWO),
    ];

    let statuses = pipeline.ingest_batch(&documents).await;

    assert_eq!(statuses.len(), 3);
    assert!(statuses[0].is_ok());
    assert!(matches!(statuses[1].outcome, Err(StudyError::InvalidInput(_))));
    assert!(statuses[2].is_ok());
    let sources: Vec<String> = pipeline.documents().await.into_iter().map(|d| d.source).collect();
    assert_eq!(sources, vec!["good.txt", "also-good.txt"]);
}

#[tokio::test]
async fn reingesting_a_document_id_is_rejected() {
    let pipeline = common::pipeline(scenario_config(), Arc::new(ScriptedCompletion::new("x")));
    let document = photosynthesis_document();
    pipeline.ingest(&document).await.unwrap();
    assert!(matches!(pipeline.ingest(&document).await, Err(StudyError::InvalidInput(_))));
}

#[tokio::test]
async fn deleted_document_disappears_from_retrieval() {
    let pipeline = common::pipeline(scenario_config(), Arc::new(ScriptedCompletion::new("x")));
    let first = Document::from_text("a.txt", PHOTOSYNTHESIS_PAGE_ONE);
    let second = Document::from_text("b.txt", PHOTOSYNTHESIS_PAGE_TWO);
    pipeline.ingest(&first).await.unwrap();
    pipeline.ingest(&second).await.unwrap();

    let removed = pipeline.delete_document(&first.id).await.unwrap();
    assert!(removed > 0);

    let hits = pipeline.retrieve("photosynthesis oxygen glucose", 10).await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.chunk.document_id == second.id));
    assert_eq!(pipeline.delete_document(&first.id).await.unwrap(), 0);
}

#[tokio::test]
async fn ingest_bytes_extracts_plain_text() {
    let pipeline = common::pipeline(scenario_config(), Arc::new(ScriptedCompletion::new("x")));
    let document = pipeline
        .ingest_bytes("notes.md", PHOTOSYNTHESIS_PAGE_ONE.as_bytes(), "text/markdown")
        .await
        .unwrap();
    assert_eq!(pipeline.documents().await[0].document_id, document.id);

    let err = pipeline.ingest_bytes("photo.png", b"\x89PNG", "image/png").await.unwrap_err();
    assert!(matches!(err, StudyError::InvalidInput(_)));
}

#[tokio::test]
async fn summary_without_topic_uses_the_whole_corpus() {
    let completion = Arc::new(ScriptedCompletion::new("- Plants make glucose.\n- Oxygen is released."));
    let pipeline = common::pipeline(scenario_config(), completion.clone());
    pipeline.ingest(&photosynthesis_document()).await.unwrap();

    let summary = pipeline.summarize(None, SummaryFormat::Bullets).await.unwrap();

    assert_eq!(summary.format, SummaryFormat::Bullets);
    assert_eq!(summary.sources, vec!["photosynthesis.pdf"]);
    let prompt = &completion.prompts()[0];
    assert!(prompt.contains("5-7 bullet points"));
    assert!(prompt.contains("thylakoid"));
    assert!(prompt.contains("chlorophyll absorbs"));
}

#[tokio::test]
async fn summary_formats_change_only_the_template() {
    let completion = Arc::new(ScriptedCompletion::new("summary"));
    let pipeline = common::pipeline(scenario_config(), completion.clone());
    pipeline.ingest(&photosynthesis_document()).await.unwrap();

    pipeline.summarize(Some("glucose"), SummaryFormat::Short).await.unwrap();
    pipeline.summarize(Some("glucose"), SummaryFormat::Simplified).await.unwrap();

    let prompts = completion.prompts();
    assert!(prompts[0].contains("2-3 sentences"));
    assert!(prompts[1].contains("15 year old"));
    let context = |p: &str| p.split("Content:").nth(1).map(str::to_string);
    assert_eq!(context(&prompts[0]), context(&prompts[1]));
}

#[tokio::test]
async fn summary_sources_list_only_documents_in_the_prompt() {
    let completion = Arc::new(ScriptedCompletion::new("summary"));
    let config = StudyConfig::builder()
        .chunk_size(500)
        .chunk_overlap(50)
        .context_char_budget(450)
        .build()
        .unwrap();
    let pipeline = common::pipeline(config, completion.clone());
    pipeline.ingest(&Document::from_text("first.txt", PHOTOSYNTHESIS_PAGE_ONE)).await.unwrap();
    pipeline.ingest(&Document::from_text("second.txt", PHOTOSYNTHESIS_PAGE_TWO)).await.unwrap();

    let summary =
        pipeline.summarize(Some("photosynthesis glucose oxygen"), SummaryFormat::Short).await.unwrap();

    assert_eq!(summary.sources.len(), 1);
    let prompt = &completion.prompts()[0];
    let has_first = prompt.contains("chlorophyll absorbs");
    let has_second = prompt.contains("thylakoid");
    assert!(has_first != has_second, "exactly one document should fit the budget");
    let expected = if has_first { "first.txt" } else { "second.txt" };
    assert_eq!(summary.sources, vec![expected]);
}

#[tokio::test]
async fn summary_of_empty_corpus_is_insufficient_context() {
    let completion = Arc::new(ScriptedCompletion::new("unused"));
    let pipeline = common::pipeline(scenario_config(), completion.clone());

    let err = pipeline.summarize(None, SummaryFormat::Detailed).await.unwrap_err();
    assert!(err.is_insufficient_context());
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn repeated_definitions_keep_the_last_one() {
    let completion = Arc::new(ScriptedCompletion::new(
        "Here are the key terms:\n\n\
         1. **Term:** Chlorophyll\n   **Definition:** A green pigment.\n\n\
         2. **Term:** Glucose\n   **Definition:** A simple sugar made during photosynthesis.\n\n\
         3. **Term:** chlorophyll\n   **Definition:** The pigment that absorbs light energy.\n\n\
         4. **Term:** Stroma\n   **Definition:**\n",
    ));
    let pipeline = common::pipeline(scenario_config(), completion);
    let document = photosynthesis_document();
    pipeline.ingest(&document).await.unwrap();

    let definitions = pipeline.extract_definitions(None).await.unwrap();

    assert_eq!(definitions.len(), 2);
    assert_eq!(definitions.malformed_count, 1);
    let chlorophyll = definitions.get("CHLOROPHYLL").unwrap();
    assert_eq!(chlorophyll.definition, "The pigment that absorbs light energy.");
    let source_chunk = chlorophyll.source_chunk.as_deref().unwrap();
    assert!(source_chunk.starts_with(&document.id));
    assert_eq!(definitions.sources, vec!["photosynthesis.pdf"]);
}
