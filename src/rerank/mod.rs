//! Second-pass reranking with a remote cross-encoder
//!
//! Public interface:
//! - `RelevanceModel` trait (one remote scoring call per batch)
//! - `CohereModel` client for the Cohere v2 rerank API
//! - `Reranker` adapter: chunking, payload validation, re-sorting
//!
//! Batch policy: candidate sets larger than the batch size are split into
//! consecutive chunks, one call each, and the merged scores are re-sorted.
//! Nothing is truncated here; the output is always a permutation of the input.

mod cohere;

use std::collections::HashSet;

pub use cohere::CohereModel;

use crate::error::{Error, Result};
use crate::retrieval::{rank_order, ScoredCandidate};

/// One document sent for scoring
#[derive(Debug, Clone, Copy)]
pub struct RerankDocument<'a> {
    pub id: i64,
    pub content: &'a str,
}

/// Relevance of the document at `index` within the submitted batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceScore {
    pub index: usize,
    pub relevance_score: f32,
}

/// Remote relevance model interface
pub trait RelevanceModel: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Score every document in the batch against the query, in any order
    fn score(&self, query: &str, documents: &[RerankDocument<'_>]) -> Result<Vec<RelevanceScore>>;
}

impl<T: RelevanceModel + ?Sized> RelevanceModel for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn score(&self, query: &str, documents: &[RerankDocument<'_>]) -> Result<Vec<RelevanceScore>> {
        (**self).score(query, documents)
    }
}

/// Reorders candidates by remote relevance
pub struct Reranker<M> {
    model: M,
    batch_size: usize,
}

impl<M: RelevanceModel> Reranker<M> {
    /// `batch_size` of 0 is treated as 1
    pub fn new(model: M, batch_size: usize) -> Self {
        Self {
            model,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Replace each candidate's score with its relevance and re-sort
    ///
    /// Fails with `RerankUnavailable` if any chunk fails or returns a payload
    /// that does not score every submitted document exactly once.
    pub fn rerank<'s>(
        &self,
        query: &str,
        candidates: Vec<ScoredCandidate<'s>>,
    ) -> Result<Vec<ScoredCandidate<'s>>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let chunks = candidates.len().div_ceil(self.batch_size);
        if chunks > 1 {
            tracing::debug!(
                candidates = candidates.len(),
                batch_size = self.batch_size,
                chunks,
                "splitting rerank request"
            );
        }

        let mut reranked = Vec::with_capacity(candidates.len());
        for chunk in candidates.chunks(self.batch_size) {
            let documents: Vec<RerankDocument<'_>> = chunk
                .iter()
                .map(|c| RerankDocument {
                    id: c.card.id,
                    content: &c.card.content,
                })
                .collect();

            let scores = self.model.score(query, &documents)?;
            validate_scores(&scores, chunk.len())?;

            for score in scores {
                let candidate = chunk[score.index];
                reranked.push(ScoredCandidate::new(candidate.card, score.relevance_score));
            }
        }

        reranked.sort_by(rank_order);
        tracing::info!(
            model = self.model.name(),
            reranked = reranked.len(),
            "reranking completed"
        );
        Ok(reranked)
    }
}

/// Every index in range, each document scored exactly once, scores finite
fn validate_scores(scores: &[RelevanceScore], submitted: usize) -> Result<()> {
    let malformed = |reason: String| Error::RerankUnavailable {
        reason: format!("malformed payload: {}", reason),
    };

    if scores.len() != submitted {
        return Err(malformed(format!(
            "{} scores returned for {} documents",
            scores.len(),
            submitted
        )));
    }

    let mut seen = HashSet::with_capacity(submitted);
    for score in scores {
        if score.index >= submitted {
            return Err(malformed(format!("index {} out of range", score.index)));
        }
        if !seen.insert(score.index) {
            return Err(malformed(format!("index {} scored twice", score.index)));
        }
        if !score.relevance_score.is_finite() {
            return Err(malformed(format!(
                "non-finite score for index {}",
                score.index
            )));
        }
    }
    Ok(())
}
