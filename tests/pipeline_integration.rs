//! Integration tests for the search pipeline with in-process fakes
//!
//! Remote services are replaced by small trait implementations, except where
//! a test exercises real HTTP timeout behaviour.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cardscry::anki::Notifier;
use cardscry::embeddings::QueryEncoder;
use cardscry::http::RetryPolicy;
use cardscry::llm::{extract_blocks, fenced_blocks, ChatModel};
use cardscry::rerank::{CohereModel, RelevanceModel, RelevanceScore, RerankDocument};
use cardscry::{
    Card, EmbeddingStore, Error, Pipeline, PipelineOptions, RerankFailurePolicy, Stage,
};
use tempfile::TempDir;

use common::{silent_endpoint, write_store};

/// Returns a fixed embedding and counts calls
struct CountingEncoder {
    embedding: Vec<f32>,
    calls: Arc<AtomicUsize>,
}

impl CountingEncoder {
    fn new(embedding: Vec<f32>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let encoder = Self {
            embedding,
            calls: Arc::clone(&calls),
        };
        (encoder, calls)
    }
}

impl QueryEncoder for CountingEncoder {
    fn encode(&self, _text: &str) -> cardscry::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.embedding.clone())
    }

    fn model_name(&self) -> &str {
        "counting"
    }
}

/// Keeps the similarity order by echoing a descending score per position
struct PassThroughModel;

impl RelevanceModel for PassThroughModel {
    fn name(&self) -> &str {
        "pass-through"
    }

    fn score(
        &self,
        _query: &str,
        documents: &[RerankDocument<'_>],
    ) -> cardscry::Result<Vec<RelevanceScore>> {
        Ok((0..documents.len())
            .map(|index| RelevanceScore {
                index,
                relevance_score: 1.0 - index as f32 * 0.1,
            })
            .collect())
    }
}

/// Pass-through scoring that records how often it was asked
struct CountingModel {
    calls: Arc<AtomicUsize>,
}

impl RelevanceModel for CountingModel {
    fn name(&self) -> &str {
        "counting"
    }

    fn score(
        &self,
        query: &str,
        documents: &[RerankDocument<'_>],
    ) -> cardscry::Result<Vec<RelevanceScore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PassThroughModel.score(query, documents)
    }
}

struct DownChat;

impl ChatModel for DownChat {
    fn name(&self) -> &str {
        "down"
    }

    fn complete(&self, _prompt: &str) -> cardscry::Result<String> {
        Err(Error::LlmUnavailable {
            reason: "HTTP 503: upstream overloaded".to_string(),
        })
    }
}

struct RecordingNotifier {
    calls: Arc<Mutex<Vec<Vec<i64>>>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, ids: &[i64]) -> String {
        self.calls.lock().unwrap().push(ids.to_vec());
        "recorded".to_string()
    }
}

struct ScriptedChat {
    reply: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ChatModel for ScriptedChat {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(&self, prompt: &str) -> cardscry::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

fn scripted(reply: &str) -> (Box<dyn ChatModel>, Arc<Mutex<Vec<String>>>) {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let chat = ScriptedChat {
        reply: reply.to_string(),
        prompts: Arc::clone(&prompts),
    };
    (Box::new(chat), prompts)
}

/// Cards 10, 5 and 7 on disk; the query is closest to 5, then 10
fn fixture_store(dir: &TempDir) -> EmbeddingStore {
    let path = dir.path().join("cards.db");
    write_store(
        &path,
        &[
            (10, "Card ten: aortic stenosis", vec![0.6, 0.8]),
            (5, "Card five: mitral regurgitation", vec![1.0, 0.05]),
            (7, "Card seven: tricuspid atresia", vec![0.0, 1.0]),
        ],
    );
    EmbeddingStore::open(&path).expect("fixture store loads")
}

#[test]
fn test_top_k_selection_then_id_ordered_result() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = fixture_store(&dir);
    let (encoder, _) = CountingEncoder::new(vec![1.0, 0.0]);
    let reply = "Study [nid:10] first.\n```\n[nid:10] Card ten\n```\n";
    let (chat, prompts) = scripted(reply);

    let pipeline = Pipeline::new(&store, Box::new(encoder), Box::new(PassThroughModel), chat)
        .with_options(PipelineOptions {
            top_k: 2,
            ..PipelineOptions::default()
        });
    let result = pipeline.run("systolic murmur").unwrap();

    // Similarity picks 5 then 10; display order is by id
    assert_eq!(result.card_ids(), vec![5, 10]);
    assert!(result.cards.iter().all(|c| c.id != 7));

    let prompt = &prompts.lock().unwrap()[0];
    assert!(prompt.find("[nid:5]").unwrap() < prompt.find("[nid:10]").unwrap());
    assert!(!prompt.contains("[nid:7]"));

    assert_eq!(result.query, "systolic murmur");
    assert_eq!(result.response, reply);
    assert_eq!(result.extracted_blocks, vec!["[nid:10] Card ten".to_string()]);
    assert_eq!(result.llm_ranked()[0].card.id, 10);
}

#[test]
fn test_rerank_timeout_aborts_without_result() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = fixture_store(&dir);
    let (encoder, _) = CountingEncoder::new(vec![1.0, 0.0]);
    let (chat, prompts) = scripted("never used");

    let (_listener, url) = silent_endpoint();
    let cohere = CohereModel::new(
        &format!("{}/v2/rerank", url),
        "rerank-v3.5",
        "test-key",
        Duration::from_millis(200),
        RetryPolicy::none(),
    )
    .unwrap();

    let pipeline = Pipeline::new(&store, Box::new(encoder), Box::new(cohere), chat);
    let started = Instant::now();
    let err = pipeline.run("systolic murmur").unwrap_err();

    assert!(matches!(err, Error::RerankUnavailable { .. }), "got {err:?}");
    assert_eq!(err.stage(), Stage::Rerank);
    assert!(err.to_string().contains("timed out"), "got {err}");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(prompts.lock().unwrap().is_empty(), "no completion after a failed rerank");
}

#[test]
fn test_rerank_timeout_with_similarity_fallback() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = fixture_store(&dir);
    let (encoder, _) = CountingEncoder::new(vec![1.0, 0.0]);
    let (chat, prompts) = scripted("fallback answer");

    let (_listener, url) = silent_endpoint();
    let cohere = CohereModel::new(
        &url,
        "rerank-v3.5",
        "test-key",
        Duration::from_millis(200),
        RetryPolicy::none(),
    )
    .unwrap();

    let pipeline = Pipeline::new(&store, Box::new(encoder), Box::new(cohere), chat).with_options(
        PipelineOptions {
            top_k: 3,
            rerank_top_n: None,
            on_rerank_failure: RerankFailurePolicy::Similarity,
        },
    );
    let result = pipeline.run("systolic murmur").unwrap();

    assert_eq!(result.card_ids(), vec![5, 7, 10]);
    assert_eq!(result.response, "fallback answer");
    let prompt = &prompts.lock().unwrap()[0];
    let order: Vec<usize> = ["[nid:5]", "[nid:10]", "[nid:7]"]
        .iter()
        .map(|tag| prompt.find(tag).unwrap())
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_empty_store_fails_before_encoding() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("cards.db");
    write_store(&path, &[]);
    let store = EmbeddingStore::open(&path).unwrap();

    let (encoder, calls) = CountingEncoder::new(vec![1.0, 0.0]);
    let (chat, prompts) = scripted("never used");
    let pipeline = Pipeline::new(&store, Box::new(encoder), Box::new(PassThroughModel), chat);

    let err = pipeline.run("anything").unwrap_err();
    assert!(matches!(
        err,
        Error::EmptyCandidateSet {
            stage: Stage::Select,
            ..
        }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(prompts.lock().unwrap().is_empty());
}

#[test]
fn test_zero_top_k_fails_before_encoding() {
    let store = EmbeddingStore::from_cards(vec![Card::new(1, "a", vec![1.0])]).unwrap();
    let (encoder, calls) = CountingEncoder::new(vec![1.0]);
    let (chat, _) = scripted("never used");
    let pipeline = Pipeline::new(&store, Box::new(encoder), Box::new(PassThroughModel), chat)
        .with_options(PipelineOptions {
            top_k: 0,
            ..PipelineOptions::default()
        });

    let err = pipeline.run("anything").unwrap_err();
    assert!(matches!(err, Error::EmptyCandidateSet { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dimension_mismatch_is_fatal() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = fixture_store(&dir);
    let (encoder, _) = CountingEncoder::new(vec![1.0, 0.0, 0.0]);
    let (chat, _) = scripted("never used");
    let pipeline = Pipeline::new(&store, Box::new(encoder), Box::new(PassThroughModel), chat);

    let err = pipeline.run("murmur").unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { query: 3, store: 2 }));
}

#[test]
fn test_fenced_block_extraction_properties() {
    let response = "Intro [nid:1]\n```json\n{\"a\": 1}\n```\nprose\n```\nsecond\nblock\n```\ntrailing ```unterminated";
    let blocks = extract_blocks(response);

    assert_eq!(blocks, vec!["{\"a\": 1}".to_string(), "second\nblock".to_string()]);
    for block in &blocks {
        assert!(response.contains(block.as_str()));
        assert!(!block.contains("```"));
    }

    // Restartable: a fresh scan yields the same sequence
    let first: Vec<_> = fenced_blocks(response).collect();
    let second: Vec<_> = fenced_blocks(response).collect();
    assert_eq!(first, second);
    assert_eq!(first[0].info, "json");

    assert!(extract_blocks("no fences at all").is_empty());
}

#[test]
fn test_zero_rerank_top_n_fails_before_remote_calls() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = fixture_store(&dir);
    let (encoder, encodes) = CountingEncoder::new(vec![1.0, 0.0]);
    let reranks = Arc::new(AtomicUsize::new(0));
    let model = CountingModel {
        calls: Arc::clone(&reranks),
    };
    let (chat, prompts) = scripted("never used");

    let pipeline = Pipeline::new(&store, Box::new(encoder), Box::new(model), chat).with_options(
        PipelineOptions {
            rerank_top_n: Some(0),
            ..PipelineOptions::default()
        },
    );

    let err = pipeline.run("systolic murmur").unwrap_err();
    assert!(
        matches!(err, Error::EmptyCandidateSet { stage: Stage::Rerank, .. }),
        "got {err:?}"
    );
    assert_eq!(encodes.load(Ordering::SeqCst), 0);
    assert_eq!(reranks.load(Ordering::SeqCst), 0);
    assert!(prompts.lock().unwrap().is_empty());
}

#[test]
fn test_llm_failure_aborts_without_notifying() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = fixture_store(&dir);
    let (encoder, _) = CountingEncoder::new(vec![1.0, 0.0]);
    let notified = Arc::new(Mutex::new(Vec::new()));
    let notifier = RecordingNotifier {
        calls: Arc::clone(&notified),
    };

    let pipeline = Pipeline::new(
        &store,
        Box::new(encoder),
        Box::new(PassThroughModel),
        Box::new(DownChat),
    )
    .with_notifier(Box::new(notifier));

    let err = pipeline.run("systolic murmur").unwrap_err();
    assert!(matches!(err, Error::LlmUnavailable { .. }), "got {err:?}");
    assert_eq!(err.stage(), Stage::Complete);
    assert!(err.is_remote());
    assert!(notified.lock().unwrap().is_empty());
}
