//! cardscry - retrieval-augmented flashcard search
//!
//! A query is embedded remotely, matched against a precomputed card store by
//! cosine similarity, reranked by a cross-encoder service, and handed to a
//! chat model together with the best cards. The answer, its fenced blocks and
//! the chosen cards come back as one `PipelineResult`.

pub mod anki;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod http;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod prompt;
pub mod rerank;
pub mod result;
pub mod retrieval;
pub mod store;

// Re-export commonly used types
pub use config::{Config, LogLevel, RerankFailurePolicy};
pub use error::{Error, Result, Stage};
pub use pipeline::{Pipeline, PipelineOptions};
pub use result::{PipelineResult, ReportedCard};
pub use store::{Card, EmbeddingStore};
