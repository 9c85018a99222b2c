//! Chat completion and response post-processing
//!
//! Public interface:
//! - `ChatModel` trait and the `ChatClient` HTTP implementation
//! - `fenced_blocks` / `extract_blocks` for fenced code blocks
//! - `cited_ids` for `[nid:<id>]` citations

mod blocks;
mod citations;
mod client;

pub use blocks::{extract_blocks, fenced_blocks, FencedBlock, FencedBlocks};
pub use citations::cited_ids;
pub use client::ChatClient;

use crate::error::Result;

/// Remote text-completion model
pub trait ChatModel: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Return the model's reply to `prompt`
    fn complete(&self, prompt: &str) -> Result<String>;
}

impl<T: ChatModel + ?Sized> ChatModel for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }
}

/// A model reply with its derived pieces
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub blocks: Vec<String>,
    pub cited_ids: Vec<i64>,
}

impl Completion {
    pub fn from_text(text: String) -> Self {
        let blocks = extract_blocks(&text);
        let cited_ids = cited_ids(&text);
        Self {
            text,
            blocks,
            cited_ids,
        }
    }

    /// Rescan the reply lazily, with each block's info string
    pub fn fenced_blocks(&self) -> FencedBlocks<'_> {
        fenced_blocks(&self.text)
    }
}

/// Complete `prompt` and post-process the reply
pub fn complete_and_extract(model: &dyn ChatModel, prompt: &str) -> Result<Completion> {
    let text = model.complete(prompt)?;
    let completion = Completion::from_text(text);
    tracing::debug!(
        model = model.name(),
        blocks = completion.blocks.len(),
        cited = completion.cited_ids.len(),
        "processed chat reply"
    );
    Ok(completion)
}
