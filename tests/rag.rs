//! Document index and grounded answer integration tests
//!
//! Uses deterministic fake backends; no model servers required.

use std::sync::Arc;

use friday_gateway::knowledge::TextSplitter;
use friday_gateway::{Capabilities, DocumentIndex, Error};

mod common;
use common::{
    BrokenEmbedder, EchoGenerator, HANDBOOK, HashEmbedder, RECIPE, fake_capabilities,
    test_assistant,
};

#[tokio::test]
async fn test_upload_indexes_every_chunk() {
    let generator = Arc::new(EchoGenerator::default());
    let assistant = test_assistant(fake_capabilities(generator));

    let indexed = assistant
        .upload_document(HANDBOOK.as_bytes().to_vec(), "handbook.txt")
        .await
        .unwrap();

    assert_eq!(indexed.name, "handbook.txt");
    assert!(indexed.chunks > 1);

    let chunks = assistant.index().chunks().await;
    assert_eq!(chunks.len(), indexed.chunks);
    assert!(chunks.iter().all(|c| c.source == "handbook.txt"));
    assert!(chunks.iter().all(|c| c.text.chars().count() <= 120));
    assert_eq!(
        assistant.status().await.indexed_document_name.as_deref(),
        Some("handbook.txt")
    );
}

#[tokio::test]
async fn test_chunk_text_retrieves_itself_first() {
    let generator = Arc::new(EchoGenerator::default());
    let assistant = test_assistant(fake_capabilities(generator));
    assistant
        .upload_document(HANDBOOK.as_bytes().to_vec(), "handbook.txt")
        .await
        .unwrap();

    let embedder = HashEmbedder;
    for chunk in assistant.index().chunks().await {
        let hits = assistant
            .index()
            .query_index(&chunk.text, 3, Some(&embedder))
            .await;
        assert_eq!(hits.first(), Some(&chunk.text));
        assert!(hits.len() <= 3);
    }
}

#[tokio::test]
async fn test_new_upload_replaces_document_and_history() {
    let generator = Arc::new(EchoGenerator::default());
    let assistant = test_assistant(fake_capabilities(Arc::clone(&generator)));

    assistant
        .upload_document(HANDBOOK.as_bytes().to_vec(), "handbook.txt")
        .await
        .unwrap();
    assistant.answer("When does the office open?").await.unwrap();
    assert_eq!(assistant.memory().len(), 1);

    let handbook_texts: Vec<String> = assistant
        .index()
        .chunks()
        .await
        .into_iter()
        .map(|c| c.text)
        .collect();

    assistant
        .upload_document(RECIPE.as_bytes().to_vec(), "recipe.md")
        .await
        .unwrap();

    assert!(assistant.memory().is_empty());
    let chunks = assistant.index().chunks().await;
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.source == "recipe.md"));
    assert!(chunks.iter().all(|c| !c.text.contains("office")));

    let recipe_texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
    for text in &handbook_texts {
        let hits = assistant
            .index()
            .query_index(text, 3, Some(&HashEmbedder))
            .await;
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|hit| recipe_texts.contains(hit)), "{hits:?}");
    }
}

#[tokio::test]
async fn test_answer_is_grounded_and_remembered() {
    let generator = Arc::new(EchoGenerator::default());
    let assistant = test_assistant(fake_capabilities(Arc::clone(&generator)));
    assistant
        .upload_document(HANDBOOK.as_bytes().to_vec(), "handbook.txt")
        .await
        .unwrap();

    let first = assistant.answer("When is lunch served?").await.unwrap();
    assert_eq!(first.response_text, "answer: When is lunch served?");
    assert!(!first.context_used.is_empty());
    assert!(first.context_used.len() <= 3);

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("Context:"));
    assert!(prompt.contains(&first.context_used[0]));

    assistant.answer("And parking?").await.unwrap();
    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("Human: When is lunch served?\nAI: answer: When is lunch served?"));
    assert_eq!(assistant.memory().len(), 2);
}

#[tokio::test]
async fn test_answer_without_document_uses_general_prompt() {
    let generator = Arc::new(EchoGenerator::default());
    let assistant = test_assistant(fake_capabilities(Arc::clone(&generator)));

    let answer = assistant.answer("Hello there").await.unwrap();
    assert!(answer.context_used.is_empty());

    let prompt = generator.last_prompt().unwrap();
    assert!(!prompt.contains("Context:"));
    assert!(prompt.contains("Question: Hello there"));
}

#[tokio::test]
async fn test_clear_state_reports_whether_index_existed() {
    let generator = Arc::new(EchoGenerator::default());
    let assistant = test_assistant(fake_capabilities(generator));

    assert!(!assistant.clear_state().await);

    assistant
        .upload_document(HANDBOOK.as_bytes().to_vec(), "handbook.txt")
        .await
        .unwrap();
    assistant.answer("When does the office open?").await.unwrap();
    let chunks = assistant.index().chunks().await;

    assert!(assistant.clear_state().await);
    assert!(assistant.memory().is_empty());
    assert!(assistant.index().document_name().await.is_none());
    for chunk in &chunks {
        let hits = assistant
            .index()
            .query_index(&chunk.text, 3, Some(&HashEmbedder))
            .await;
        assert!(hits.is_empty());
    }
    assert!(!assistant.clear_state().await);
}

#[tokio::test]
async fn test_upload_without_embedder_drops_previous_index() {
    let index = DocumentIndex::in_memory(TextSplitter::default());
    let memory = friday_gateway::ConversationMemory::new();

    index
        .index_document(HANDBOOK.as_bytes().to_vec(), "handbook.txt", Some(&HashEmbedder), &memory)
        .await
        .unwrap();

    let err = index
        .index_document(RECIPE.as_bytes().to_vec(), "recipe.txt", None, &memory)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Unavailable(_)));
    assert!(index.document_name().await.is_none());
}

#[tokio::test]
async fn test_failed_embedding_leaves_no_index() {
    let index = DocumentIndex::in_memory(TextSplitter::default());
    let memory = friday_gateway::ConversationMemory::new();

    let result = index
        .index_document(HANDBOOK.as_bytes().to_vec(), "handbook.txt", Some(&BrokenEmbedder), &memory)
        .await;

    assert!(result.is_err());
    assert!(index.document_name().await.is_none());
    assert!(index.query_index("office", 3, Some(&HashEmbedder)).await.is_empty());
}

#[tokio::test]
async fn test_empty_document_rejected() {
    let generator = Arc::new(EchoGenerator::default());
    let assistant = test_assistant(fake_capabilities(generator));

    let err = assistant
        .upload_document(b"   \n\n  ".to_vec(), "blank.txt")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Document(_)));
    assert!(assistant.status().await.indexed_document_name.is_none());
}

#[tokio::test]
async fn test_persisted_index_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index").join("friday.db");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let memory = friday_gateway::ConversationMemory::new();

    let index = DocumentIndex::new(TextSplitter::new(120, 20).unwrap(), Some(path.clone()));
    index
        .index_document(HANDBOOK.as_bytes().to_vec(), "handbook.txt", Some(&HashEmbedder), &memory)
        .await
        .unwrap();
    let chunk_count = index.chunks().await.len();
    drop(index);
    assert!(path.exists());

    let restored = DocumentIndex::new(TextSplitter::new(120, 20).unwrap(), Some(path.clone()));
    assert_eq!(restored.restore().await.as_deref(), Some("handbook.txt"));
    assert_eq!(restored.chunks().await.len(), chunk_count);

    let hits = restored
        .query_index("When does the office open?", 1, Some(&HashEmbedder))
        .await;
    assert_eq!(hits.len(), 1);

    assert!(restored.clear_index().await);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_no_language_model_is_reported() {
    let assistant = test_assistant(Capabilities::none().with_embedder(Arc::new(HashEmbedder)));

    let err = assistant.answer("anything").await.unwrap_err();
    assert_eq!(err.to_string(), "language model not initialized");
    assert!(assistant.memory().is_empty());
}
