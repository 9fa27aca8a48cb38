//! LLM client seam for SQL generation.
//!
//! The model is asked to answer with a single line, either
//! `sql: <statement>` or `error: <explanation>`. `HttpLlmClient` talks to
//! an OpenAI-compatible chat-completions endpoint; with the placeholder
//! API key it short-circuits to a canned reply so the pipeline runs
//! offline.

use crate::error::{Result, WardError};
use async_trait::async_trait;

/// Placeholder key enabling offline/dev mode.
pub const DUMMY_API_KEY: &str = "dummy-api-key";

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate_sql(&self, prompt: &str) -> Result<LlmReply>;
}

/// Parsed model reply; exactly one side is populated.
#[derive(Debug, Clone)]
pub struct LlmReply {
    pub sql: Option<String>,
    pub error: Option<String>,
}

impl LlmReply {
    /// Split `key: value` on the first colon. Anything other than an `sql`
    /// or `error` key is a malformed reply.
    pub fn parse(content: &str) -> Result<Self> {
        let (key, value) = content
            .trim()
            .split_once(':')
            .ok_or_else(|| WardError::Llm(format!("malformed model reply: {}", content)))?;
        match key.trim() {
            "sql" => Ok(Self {
                sql: Some(value.trim().to_string()),
                error: None,
            }),
            "error" => Ok(Self {
                sql: None,
                error: Some(value.trim().to_string()),
            }),
            other => Err(WardError::Llm(format!(
                "unexpected key in model reply: {}",
                other
            ))),
        }
    }
}

pub struct HttpLlmClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, prompt: &str) -> Result<String> {
        if self.api_key == DUMMY_API_KEY {
            return Ok("sql: select person_id from person".to_string());
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You translate questions into a single SQL statement. \
                                Reply with exactly one line, either 'sql: <statement>' \
                                or 'error: <explanation>'."
                },
                {"role": "user", "content": prompt}
            ],
            "temperature": 0,
            "max_tokens": 200
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| WardError::Llm(format!("LLM API call failed: {}", e)))?;

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WardError::Llm(format!("failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| WardError::Llm("no content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_sql(&self, prompt: &str) -> Result<LlmReply> {
        let content = self.call(prompt).await?;
        LlmReply::parse(&content)
    }
}
