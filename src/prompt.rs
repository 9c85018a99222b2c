//! Prompt construction for the chat model
//!
//! Pure and deterministic: the same query and cards always produce the same
//! bytes. Each card is tagged `[nid:<id>]` so citations in the answer can be
//! mapped back to cards.

use std::fmt::Write as _;

use crate::config::PromptSection;
use crate::error::{Error, Result, Stage};
use crate::retrieval::ScoredCandidate;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    header: String,
}

impl PromptBuilder {
    /// Use `header` verbatim
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    /// Header template with `{in_prompt_number}` substituted
    pub fn from_section(section: &PromptSection) -> Self {
        Self::new(section.rendered_header())
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    /// Format the query and ranked cards into the prompt text
    pub fn build(&self, query: &str, ranked: &[ScoredCandidate<'_>]) -> Result<String> {
        if ranked.is_empty() {
            return Err(Error::EmptyCandidateSet {
                stage: Stage::Prompt,
                reason: "no cards to put in the prompt".to_string(),
            });
        }

        let mut prompt = String::new();
        // Writing to a String cannot fail
        let _ = write!(prompt, "# Prompt\n{}\n\n", self.header.trim());
        let _ = write!(prompt, "## Query\n{}\n\n", query.trim());
        prompt.push_str("## Flashcard Pool\n");
        for candidate in ranked {
            let _ = writeln!(
                prompt,
                "- [nid:{}] {}",
                candidate.card.id,
                single_line(&candidate.card.content)
            );
        }
        Ok(prompt)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from_section(&PromptSection::default())
    }
}

/// One card per line: collapse line breaks and runs of whitespace
fn single_line(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}
