//! Answering engine backed by an OpenAI-compatible chat-completions API.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};

use crate::collaborators::{AnswerRequest, AnsweringEngine};
use crate::error::AnalysisError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const COLLABORATOR: &str = "answering engine";
const DEFAULT_PERSONA: &str = "default";

/// Client for `POST {base}/chat/completions`.
///
/// Use [`OpenAiAnswerClient::new`] for production or
/// [`OpenAiAnswerClient::with_base_url`] to point at a mock server in tests.
pub struct OpenAiAnswerClient {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl OpenAiAnswerClient {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, AnalysisError> {
        Self::with_base_url(api_key, timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_base_url(
        api_key: Option<&str>,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.map(str::to_owned),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    fn request_body(request: &AnswerRequest<'_>) -> Value {
        let mut messages = Vec::new();
        if request.persona != DEFAULT_PERSONA && !request.persona.trim().is_empty() {
            messages.push(json!({
                "role": "system",
                "content": format!(
                    "Answer as the following persona would ask and expect: {}",
                    request.persona
                ),
            }));
        }
        let content = match request.context {
            Some(context) if !context.trim().is_empty() => {
                format!("{}\n\nSearch context:\n{context}", request.prompt)
            }
            _ => request.prompt.to_string(),
        };
        messages.push(json!({ "role": "user", "content": content }));

        json!({
            "model": request.model,
            "messages": messages,
            "temperature": 0.2,
        })
    }
}

impl AnsweringEngine for OpenAiAnswerClient {
    async fn answer(&self, request: AnswerRequest<'_>) -> Result<String, AnalysisError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .json(&Self::request_body(&request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::UpstreamStatus {
                collaborator: COLLABORATOR,
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::MalformedResponse {
                collaborator: COLLABORATOR,
                reason: e.to_string(),
            })?;

        body.get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| AnalysisError::MalformedResponse {
                collaborator: COLLABORATOR,
                reason: "missing choices[0].message.content".to_string(),
            })
    }
}
