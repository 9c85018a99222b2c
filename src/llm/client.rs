//! OpenAI-compatible chat completions client

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::ChatModel;
use crate::config::{resolve_api_key, Config};
use crate::error::{Error, Result};
use crate::http::{self, RetryPolicy};

/// Blocking client for `POST {base_url}/chat/completions`
pub struct ChatClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    system_prompt: Option<String>,
    retry: RetryPolicy,
}

impl ChatClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(Error::Config("missing chat model name".to_string()));
        }
        Ok(Self {
            client: http::build_client(timeout, Some(api_key))?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            temperature: 0.7,
            system_prompt: None,
            retry,
        })
    }

    /// Build from the `[llm]` and `[network]` sections
    pub fn from_config(config: &Config) -> Result<Self> {
        let section = &config.llm;
        let api_key = resolve_api_key("llm", section.api_key.as_deref(), &section.api_key_env)?;
        let client = Self::new(
            &section.endpoint,
            &section.model,
            &api_key,
            config.network.timeout(),
            RetryPolicy::new(config.network.max_retries, config.network.retry_backoff()),
        )?;
        Ok(client
            .with_temperature(section.temperature)
            .with_system_prompt(section.system_prompt.clone()))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt.filter(|s| !s.trim().is_empty());
        self
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages,
        }
    }
}

impl ChatModel for ChatClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        let request = self.request(prompt);

        tracing::info!(model = %self.model, prompt_chars = prompt.len(), "calling llm service");
        let started = Instant::now();
        let response: ChatResponse = self
            .retry
            .run("llm", || http::post_json(&self.client, &self.endpoint, &request))
            .map_err(|e| Error::LlmUnavailable {
                reason: e.to_string(),
            })?;
        http::log_elapsed("llm", started);

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| Error::LlmUnavailable {
                reason: "response contained no choices".to_string(),
            })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
