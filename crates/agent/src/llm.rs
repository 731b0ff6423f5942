use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use phonebook_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::tools::ToolSpec;

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub tools: Vec<ToolSpec>,
    pub temperature: f32,
}

/// What the model answered: a single function call, or plain text.
#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    /// `arguments` is passed through untouched; providers send either an
    /// object or a JSON-encoded string.
    ToolCall { name: String, arguments: Value },
    Text(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// Client for any `/chat/completions` endpoint speaking the OpenAI wire
/// format, which includes the hosted API and a local Ollama server.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build LLM HTTP client")?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            max_retries,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let base_url = config
            .effective_base_url()
            .ok_or_else(|| anyhow!("provider {:?} has no chat endpoint", config.provider))?;

        Self::new(
            &base_url,
            config.model.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_body(&self, request: &CompletionRequest) -> ChatRequest {
        let tools = request
            .tools
            .iter()
            .map(|spec| ToolDef {
                tool_type: "function".to_string(),
                function: FunctionDef {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.clone(),
                },
            })
            .collect::<Vec<_>>();
        let tool_choice = (!tools.is_empty()).then(|| Value::String("auto".to_string()));

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: request.system.clone() },
                ChatMessage { role: "user".to_string(), content: request.user.clone() },
            ],
            temperature: request.temperature,
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice,
        }
    }

    async fn send_once(&self, body: &ChatRequest) -> Result<ChatResponse, SendError> {
        let mut builder = self.http.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|error| SendError::Retryable(anyhow!("LLM request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = anyhow!("LLM returned {status}: {body}");
            return Err(if status.is_server_error() {
                SendError::Retryable(error)
            } else {
                SendError::Fatal(error)
            });
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|error| SendError::Fatal(anyhow!("LLM response parse failed: {error}")))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = self.build_body(request);

        let mut attempt = 0;
        let response = loop {
            match self.send_once(&body).await {
                Ok(response) => break response,
                Err(SendError::Retryable(error)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "llm.retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "retrying chat completion"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(SendError::Retryable(error)) | Err(SendError::Fatal(error)) => {
                    return Err(error)
                }
            }
        };

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow!("LLM response contained no choices"))?;

        if let Some(call) = message.tool_calls.and_then(|calls| calls.into_iter().next()) {
            return Ok(Completion::ToolCall {
                name: call.function.name,
                arguments: call.function.arguments,
            });
        }

        Ok(Completion::Text(message.content.unwrap_or_default()))
    }
}

enum SendError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ToolDef {
    #[serde(rename = "type")]
    tool_type: String,
    function: FunctionDef,
}

#[derive(Serialize)]
struct FunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}
