//! Exact nearest-neighbour selection by full cosine scan
//!
//! O(N·D) per query. Fine for a single deck (tens of thousands of cards);
//! an indexed selector can replace it behind `CandidateSelector`.

use rayon::prelude::*;

use super::{rank_order, CandidateSelector, ScoredCandidate};
use crate::embeddings::l2_norm;
use crate::embeddings::similarity::cosine_with_norm;
use crate::error::{Error, Result, Stage};
use crate::store::EmbeddingStore;

/// Scores every card in the store against the query
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactSelector;

impl CandidateSelector for ExactSelector {
    fn name(&self) -> &'static str {
        "exact-cosine"
    }

    fn select<'s>(
        &self,
        query_embedding: &[f32],
        store: &'s EmbeddingStore,
        k: usize,
    ) -> Result<Vec<ScoredCandidate<'s>>> {
        if store.is_empty() {
            return Err(Error::EmptyCandidateSet {
                stage: Stage::Select,
                reason: "the embedding store contains no cards".to_string(),
            });
        }
        if query_embedding.len() != store.dimension() {
            return Err(Error::DimensionMismatch {
                query: query_embedding.len(),
                store: store.dimension(),
            });
        }
        if k == 0 {
            return Err(Error::EmptyCandidateSet {
                stage: Stage::Select,
                reason: "top_k is 0".to_string(),
            });
        }

        let query_norm = l2_norm(query_embedding);
        let mut scored: Vec<ScoredCandidate<'s>> = store
            .cards()
            .par_iter()
            .map(|card| {
                let score = cosine_with_norm(query_embedding, query_norm, &card.embedding);
                // NaN components would otherwise sort above every real score
                let score = if score.is_nan() { -1.0 } else { score + 0.0 };
                ScoredCandidate::new(card, score)
            })
            .collect();

        if scored.len() > k {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);

        tracing::info!(
            selector = self.name(),
            scanned = store.len(),
            kept = scored.len(),
            "completed cosine similarity scan"
        );
        Ok(scored)
    }
}
