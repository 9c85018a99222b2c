//! Cohere v2 rerank client

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{RelevanceModel, RelevanceScore, RerankDocument};
use crate::config::{resolve_api_key, Config};
use crate::error::{Error, Result};
use crate::http::{self, RetryPolicy};

/// Blocking client for `POST https://api.cohere.ai/v2/rerank`
pub struct CohereModel {
    client: Client,
    endpoint: String,
    model: String,
    retry: RetryPolicy,
}

impl CohereModel {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(Error::Config("missing rerank model name".to_string()));
        }
        Ok(Self {
            client: http::build_client(timeout, Some(api_key))?,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            retry,
        })
    }

    /// Build from the `[rerank]` and `[network]` sections
    pub fn from_config(config: &Config) -> Result<Self> {
        let section = &config.rerank;
        let api_key = resolve_api_key("rerank", section.api_key.as_deref(), &section.api_key_env)?;
        Self::new(
            &section.endpoint,
            &section.model,
            &api_key,
            config.network.timeout(),
            RetryPolicy::new(config.network.max_retries, config.network.retry_backoff()),
        )
    }
}

impl RelevanceModel for CohereModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn score(&self, query: &str, documents: &[RerankDocument<'_>]) -> Result<Vec<RelevanceScore>> {
        let request = RerankRequest {
            model: &self.model,
            query,
            documents: documents.iter().map(|d| d.content).collect(),
        };

        tracing::info!(documents = documents.len(), "calling rerank service");
        let started = Instant::now();
        let response: RerankResponse = self
            .retry
            .run("rerank", || http::post_json(&self.client, &self.endpoint, &request))
            .map_err(|e| Error::RerankUnavailable {
                reason: e.to_string(),
            })?;
        http::log_elapsed("rerank", started);

        Ok(response
            .results
            .into_iter()
            .map(|r| RelevanceScore {
                index: r.index,
                relevance_score: r.relevance_score,
            })
            .collect())
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}
