//! OpenAI-compatible embeddings client for query encoding

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::QueryEncoder;
use crate::config::{resolve_api_key, Config};
use crate::error::{Error, Result};
use crate::http::{self, RetryPolicy};

/// Blocking client for `POST {base_url}/embeddings`
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    instruction: Option<String>,
    retry: RetryPolicy,
}

impl RemoteEmbedder {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(Error::Config("missing embedding model name".to_string()));
        }
        let client = http::build_client(timeout, Some(api_key))?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            instruction: None,
            retry,
        })
    }

    /// Build from the `[embedding]` and `[network]` sections
    pub fn from_config(config: &Config) -> Result<Self> {
        let section = &config.embedding;
        let api_key = resolve_api_key(
            "embedding",
            section.api_key.as_deref(),
            &section.api_key_env,
        )?;
        let retry = RetryPolicy::new(config.network.max_retries, config.network.retry_backoff());
        Ok(Self::new(
            &section.endpoint,
            &section.model,
            &api_key,
            config.network.timeout(),
            retry,
        )?
        .with_instruction(section.instruction.clone()))
    }

    /// Prefix queries with an instruction (asymmetric encoders)
    pub fn with_instruction(mut self, instruction: Option<String>) -> Self {
        self.instruction = instruction.filter(|i| !i.trim().is_empty());
        self
    }

    fn input_for(&self, text: &str) -> String {
        match &self.instruction {
            Some(instruction) => format!("{}\n\n{}", instruction, text),
            None => text.to_string(),
        }
    }
}

impl QueryEncoder for RemoteEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let input = self.input_for(text);
        let request = EmbeddingRequest {
            model: &self.model,
            input: &input,
        };

        tracing::info!(model = %self.model, "calling embedding service");
        let started = Instant::now();
        let response: EmbeddingResponse = self
            .retry
            .run("embedding", || http::post_json(&self.client, &self.endpoint, &request))
            .map_err(|e| Error::EncoderUnavailable {
                reason: e.to_string(),
            })?;
        http::log_elapsed("embedding", started);

        response
            .data
            .into_iter()
            .min_by_key(|entry| entry.index)
            .map(|entry| entry.embedding)
            .ok_or_else(|| Error::EncoderUnavailable {
                reason: "response contained no embeddings".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
