//! Result assembly and presentation
//!
//! The reported card order is ascending by card id, not by score. Relevance
//! only decides which cards make the cut; display order stays stable for
//! consumers that sort by id.

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::llm::cited_ids;
use crate::retrieval::ScoredCandidate;

/// Content shown per card in the text rendering
const CONTENT_PREVIEW_CHARS: usize = 200;

/// One card as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedCard {
    pub id: i64,
    pub content: String,
    pub score: f32,
}

/// A reported card the model cited, with its 1-based citation rank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LlmRankedCard<'a> {
    pub rank: usize,
    pub card: &'a ReportedCard,
}

/// Everything one invocation produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub query: String,
    pub cards: Vec<ReportedCard>,
    pub prompt: String,
    pub response: String,
    pub extracted_blocks: Vec<String>,
    pub downstream_status: String,
}

/// Build the final result; cards are reordered by ascending id
pub fn assemble(
    query: &str,
    ranked: &[ScoredCandidate<'_>],
    prompt: String,
    response: String,
    extracted_blocks: Vec<String>,
    downstream_status: String,
) -> PipelineResult {
    let mut cards: Vec<ReportedCard> = ranked
        .iter()
        .map(|c| ReportedCard {
            id: c.card.id,
            content: c.card.content.clone(),
            score: c.score,
        })
        .collect();
    cards.sort_by_key(|card| card.id);

    PipelineResult {
        query: query.to_string(),
        cards,
        prompt,
        response,
        extracted_blocks,
        downstream_status,
    }
}

impl PipelineResult {
    pub fn card_ids(&self) -> Vec<i64> {
        self.cards.iter().map(|c| c.id).collect()
    }

    /// Ids cited in the response, first appearance first
    pub fn cited_ids(&self) -> Vec<i64> {
        cited_ids(&self.response)
    }

    /// Reported cards the model cited, in citation order
    ///
    /// Citations of ids that were not reported are skipped.
    pub fn llm_ranked(&self) -> Vec<LlmRankedCard<'_>> {
        self.cited_ids()
            .into_iter()
            .filter_map(|id| self.cards.iter().find(|c| c.id == id))
            .enumerate()
            .map(|(i, card)| LlmRankedCard { rank: i + 1, card })
            .collect()
    }

    /// Pretty JSON of the result record
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Sectioned human-readable rendering
    pub fn render_text(&self) -> String {
        let rule = "─".repeat(60);
        let mut out = String::new();

        out.push_str(&format!("{} \"{}\"\n", "Query:".bold(), self.query));
        out.push_str(&format!("\n{}\n{}\n", "Results".bold().blue(), rule));
        for card in &self.cards {
            out.push_str(&format!(
                "[nid:{}] {}\n    {}\n",
                card.id,
                format!("score {:.3}", card.score).dimmed(),
                truncate_content(&card.content, CONTENT_PREVIEW_CHARS)
            ));
        }

        let picks = self.llm_ranked();
        out.push_str(&format!("\n{}\n{}\n", "LLM picks".bold().blue(), rule));
        if picks.is_empty() {
            out.push_str(&format!("{}\n", "(no cards cited)".dimmed()));
        }
        for pick in &picks {
            out.push_str(&format!("{}. [nid:{}]\n", pick.rank, pick.card.id));
        }

        out.push_str(&format!("\n{}\n{}\n{}\n", "Prompt".bold().blue(), rule, self.prompt.trim_end()));
        out.push_str(&format!("\n{}\n{}\n{}\n", "Response".bold().blue(), rule, self.response.trim_end()));

        if !self.extracted_blocks.is_empty() {
            out.push_str(&format!("\n{}\n{}\n", "Extracted blocks".bold().blue(), rule));
            for (i, block) in self.extracted_blocks.iter().enumerate() {
                out.push_str(&format!("{}\n{}\n", format!("[{}]", i + 1).dimmed(), block));
            }
        }

        out.push_str(&format!("\n{} {}\n", "Downstream:".bold(), self.downstream_status));
        out
    }
}

/// One-line failure message naming the stage
pub fn render_failure(err: &Error) -> String {
    format!("{} stage failed: {}", err.stage(), err)
}

fn truncate_content(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ").trim().to_string();
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
