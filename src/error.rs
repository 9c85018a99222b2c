//! Error taxonomy for the retrieval pipeline
//!
//! Every failure names the stage it came from so callers can tell
//! "nothing matched" apart from "a dependency is down".

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Config,
    Load,
    Encode,
    Select,
    Rerank,
    Prompt,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Load => "load",
            Stage::Encode => "encode",
            Stage::Select => "select",
            Stage::Rerank => "rerank",
            Stage::Prompt => "prompt",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("embedding store not found: {}", path.display())]
    StoreNotFound { path: PathBuf },

    #[error("embedding store {} is malformed: {reason}", path.display())]
    StoreFormat { path: PathBuf, reason: String },

    #[error("query embedding has {query} dimensions but the store holds {store}-dimensional cards")]
    DimensionMismatch { query: usize, store: usize },

    #[error("no candidate cards: {reason}")]
    EmptyCandidateSet { stage: Stage, reason: String },

    #[error("query text is empty")]
    EmptyQuery,

    #[error("query embedding service unavailable: {reason}")]
    EncoderUnavailable { reason: String },

    #[error("rerank service unavailable: {reason}")]
    RerankUnavailable { reason: String },

    #[error("chat completion service unavailable: {reason}")]
    LlmUnavailable { reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invocation cancelled before the {0} stage")]
    Cancelled(Stage),
}

impl Error {
    /// Stage the error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Error::StoreNotFound { .. } | Error::StoreFormat { .. } => Stage::Load,
            Error::DimensionMismatch { .. } => Stage::Select,
            Error::EmptyCandidateSet { stage, .. } => *stage,
            Error::EmptyQuery | Error::EncoderUnavailable { .. } => Stage::Encode,
            Error::RerankUnavailable { .. } => Stage::Rerank,
            Error::LlmUnavailable { .. } => Stage::Complete,
            Error::Config(_) => Stage::Config,
            Error::Cancelled(stage) => *stage,
        }
    }

    /// Whether the failure came from a remote dependency rather than local data
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::EncoderUnavailable { .. }
                | Error::RerankUnavailable { .. }
                | Error::LlmUnavailable { .. }
        )
    }

    pub(crate) fn store_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::StoreFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
