//! Embeddings module - query encoding and vector similarity
//!
//! The store is produced offline; at query time only the query text needs an
//! embedding, which comes from a remote encoder behind the `QueryEncoder`
//! trait.

mod remote;
pub(crate) mod similarity;

pub use remote::RemoteEmbedder;
pub use similarity::{cosine_similarity, l2_norm};

use crate::error::{Error, Result};

/// Trait for query embedding engines
///
/// Requires Send + Sync so one encoder can serve concurrent invocations.
pub trait QueryEncoder: Send + Sync {
    /// Generate the embedding for a query text
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Model name, for logs
    fn model_name(&self) -> &str;
}

impl<T: QueryEncoder + ?Sized> QueryEncoder for Box<T> {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        (**self).encode(text)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// A query and its embedding, owned by one invocation
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub embedding: Vec<f32>,
}

impl Query {
    /// Encode `text` once; the embedding is never cached across invocations
    pub fn encode(text: &str, encoder: &dyn QueryEncoder) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyQuery);
        }
        let embedding = encoder.encode(trimmed)?;
        if embedding.is_empty() {
            return Err(Error::EncoderUnavailable {
                reason: "encoder returned an empty embedding".to_string(),
            });
        }
        Ok(Self {
            text: trimmed.to_string(),
            embedding,
        })
    }
}
