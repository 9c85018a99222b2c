//! End-to-end search: encode → select → rerank → prompt → complete → assemble
//!
//! Stages run strictly in sequence for one query. A `Pipeline` borrows the
//! store read-only and holds no per-query state, so one instance can serve
//! concurrent invocations from several threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use uuid::Uuid;

use crate::anki::{AnkiConnect, DisabledNotifier, Notifier};
use crate::config::{Config, RerankFailurePolicy, RetrievalSection};
use crate::embeddings::{Query, QueryEncoder, RemoteEmbedder};
use crate::error::{Error, Result, Stage};
use crate::llm::{complete_and_extract, ChatClient, ChatModel};
use crate::prompt::PromptBuilder;
use crate::rerank::{CohereModel, RelevanceModel, Reranker};
use crate::result::{assemble, PipelineResult};
use crate::retrieval::{CandidateSelector, ExactSelector, ScoredCandidate};
use crate::store::EmbeddingStore;

/// Default documents per rerank request
pub const DEFAULT_RERANK_BATCH_SIZE: usize = 100;

/// Candidate sizing and failure handling for one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Candidates kept by the similarity scan
    pub top_k: usize,
    /// Cards kept after reranking; None keeps all `top_k`
    pub rerank_top_n: Option<usize>,
    pub on_rerank_failure: RerankFailurePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_section(&RetrievalSection::default())
    }
}

impl PipelineOptions {
    pub fn from_section(section: &RetrievalSection) -> Self {
        Self {
            top_k: section.top_k,
            rerank_top_n: section.rerank_top_n,
            on_rerank_failure: section.on_rerank_failure,
        }
    }
}

pub struct Pipeline<'s> {
    store: &'s EmbeddingStore,
    encoder: Box<dyn QueryEncoder>,
    selector: Box<dyn CandidateSelector>,
    reranker: Reranker<Box<dyn RelevanceModel>>,
    chat: Box<dyn ChatModel>,
    notifier: Box<dyn Notifier>,
    prompt: PromptBuilder,
    options: PipelineOptions,
}

impl<'s> Pipeline<'s> {
    /// Pipeline with the exact selector, default options and no notification
    pub fn new(
        store: &'s EmbeddingStore,
        encoder: Box<dyn QueryEncoder>,
        relevance: Box<dyn RelevanceModel>,
        chat: Box<dyn ChatModel>,
    ) -> Self {
        Self {
            store,
            encoder,
            selector: Box::new(ExactSelector),
            reranker: Reranker::new(relevance, DEFAULT_RERANK_BATCH_SIZE),
            chat,
            notifier: Box::new(DisabledNotifier),
            prompt: PromptBuilder::default(),
            options: PipelineOptions::default(),
        }
    }

    /// Wire the remote clients described by `config`
    ///
    /// Missing credentials fail here, before any query runs.
    pub fn from_config(config: &Config, store: &'s EmbeddingStore) -> Result<Self> {
        let encoder = RemoteEmbedder::from_config(config)?;
        let relevance = CohereModel::from_config(config)?;
        let chat = ChatClient::from_config(config)?;
        let notifier = AnkiConnect::notifier_from_config(config)?;

        Ok(Self::new(store, Box::new(encoder), Box::new(relevance), Box::new(chat))
            .with_rerank_batch_size(config.retrieval.rerank_batch_size)
            .with_notifier(notifier)
            .with_prompt(PromptBuilder::from_section(&config.prompt))
            .with_options(PipelineOptions::from_section(&config.retrieval)))
    }

    pub fn with_selector(mut self, selector: Box<dyn CandidateSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_rerank_batch_size(mut self, batch_size: usize) -> Self {
        self.reranker = Reranker::new(self.reranker.into_model(), batch_size);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn store(&self) -> &'s EmbeddingStore {
        self.store
    }

    /// Run one query to completion
    pub fn run(&self, query: &str) -> Result<PipelineResult> {
        self.run_cancellable(query, &AtomicBool::new(false))
    }

    /// Run one query, abandoning it at the next stage boundary once `cancel`
    /// is set. A cancelled or failed run produces no result.
    pub fn run_cancellable(&self, query: &str, cancel: &AtomicBool) -> Result<PipelineResult> {
        let span = tracing::info_span!("search", invocation = %Uuid::new_v4());
        let _enter = span.enter();
        let started = Instant::now();

        let result = self.run_stages(query, cancel);
        match &result {
            Ok(result) => tracing::info!(
                cards = result.cards.len(),
                blocks = result.extracted_blocks.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "search completed"
            ),
            Err(e) => tracing::error!(
                stage = %e.stage(),
                remote = e.is_remote(),
                error = %e,
                "search failed"
            ),
        }
        result
    }

    fn run_stages(&self, query: &str, cancel: &AtomicBool) -> Result<PipelineResult> {
        let text = query.trim();
        if text.is_empty() {
            return Err(Error::EmptyQuery);
        }
        // Nothing can match: fail before paying for any remote call
        if self.store.is_empty() {
            return Err(Error::EmptyCandidateSet {
                stage: Stage::Select,
                reason: "the embedding store contains no cards".to_string(),
            });
        }
        if self.options.top_k == 0 {
            return Err(Error::EmptyCandidateSet {
                stage: Stage::Select,
                reason: "top_k is 0".to_string(),
            });
        }
        if self.options.rerank_top_n == Some(0) {
            return Err(Error::EmptyCandidateSet {
                stage: Stage::Rerank,
                reason: "rerank_top_n is 0".to_string(),
            });
        }

        checkpoint(cancel, Stage::Encode)?;
        let query = Query::encode(text, self.encoder.as_ref())?;

        checkpoint(cancel, Stage::Select)?;
        let candidates = self
            .selector
            .select(&query.embedding, self.store, self.options.top_k)?;

        checkpoint(cancel, Stage::Rerank)?;
        let mut ranked = self.rerank(&query.text, candidates)?;
        if let Some(n) = self.options.rerank_top_n {
            ranked.truncate(n);
        }

        checkpoint(cancel, Stage::Prompt)?;
        let prompt = self.prompt.build(&query.text, &ranked)?;

        checkpoint(cancel, Stage::Complete)?;
        let completion = complete_and_extract(self.chat.as_ref(), &prompt)?;

        let target = notify_target(&completion.cited_ids, &ranked);
        let downstream_status = self.notifier.notify(&target);

        Ok(assemble(
            &query.text,
            &ranked,
            prompt,
            completion.text,
            completion.blocks,
            downstream_status,
        ))
    }

    fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredCandidate<'s>>,
    ) -> Result<Vec<ScoredCandidate<'s>>> {
        match self.reranker.rerank(query, candidates.clone()) {
            Ok(ranked) => Ok(ranked),
            Err(e @ Error::RerankUnavailable { .. })
                if self.options.on_rerank_failure == RerankFailurePolicy::Similarity =>
            {
                tracing::warn!(error = %e, "reranking failed, keeping similarity order");
                Ok(candidates)
            }
            Err(e) => Err(e),
        }
    }
}

fn checkpoint(cancel: &AtomicBool, next: Stage) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        tracing::info!(stage = %next, "invocation cancelled");
        return Err(Error::Cancelled(next));
    }
    Ok(())
}

/// Cards to show downstream: the reported cards the model cited, in citation
/// order, or every reported card (ascending id) when it cited none
fn notify_target(cited: &[i64], ranked: &[ScoredCandidate<'_>]) -> Vec<i64> {
    let known: Vec<i64> = cited
        .iter()
        .copied()
        .filter(|id| ranked.iter().any(|c| c.id() == *id))
        .collect();
    if !known.is_empty() {
        return known;
    }
    let mut all: Vec<i64> = ranked.iter().map(|c| c.id()).collect();
    all.sort_unstable();
    all
}
