//! Retrieval module - nearest-neighbour candidate selection
//!
//! Public interface:
//! - `CandidateSelector` trait (swap in an indexed selector without touching callers)
//! - `ExactSelector` full cosine scan
//! - `ScoredCandidate` borrowed card + score
//! - `rank_order` the shared descending-score, ascending-id ordering

mod selector;

use std::cmp::Ordering;

pub use selector::ExactSelector;

use crate::error::Result;
use crate::store::{Card, EmbeddingStore};

/// A card borrowed from the store with its current score
///
/// The score is similarity after selection and relevance after reranking.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'s> {
    pub card: &'s Card,
    pub score: f32,
}

impl<'s> ScoredCandidate<'s> {
    pub fn new(card: &'s Card, score: f32) -> Self {
        Self { card, score }
    }

    pub fn id(&self) -> i64 {
        self.card.id
    }
}

/// Selector interface - returns the top-k cards for a query embedding
pub trait CandidateSelector: Send + Sync {
    /// Selector name for logs
    fn name(&self) -> &'static str;

    /// Up to `k` candidates ordered by `rank_order`
    fn select<'s>(
        &self,
        query_embedding: &[f32],
        store: &'s EmbeddingStore,
        k: usize,
    ) -> Result<Vec<ScoredCandidate<'s>>>;
}

impl<T: CandidateSelector + ?Sized> CandidateSelector for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn select<'s>(
        &self,
        query_embedding: &[f32],
        store: &'s EmbeddingStore,
        k: usize,
    ) -> Result<Vec<ScoredCandidate<'s>>> {
        (**self).select(query_embedding, store, k)
    }
}

/// Descending score, ties broken by ascending card id
///
/// `0.0` and `-0.0` compare equal here, unlike under `total_cmp`.
pub fn rank_order(a: &ScoredCandidate<'_>, b: &ScoredCandidate<'_>) -> Ordering {
    unsigned_zero(b.score)
        .total_cmp(&unsigned_zero(a.score))
        .then_with(|| a.card.id.cmp(&b.card.id))
}

fn unsigned_zero(score: f32) -> f32 {
    score + 0.0
}
