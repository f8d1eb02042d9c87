use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::models::ConversationMessage;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("chat completion API key is not configured")]
    MissingApiKey,
    #[error("failed to call chat completion endpoint: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("chat completion endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode chat completion response: {0}")]
    Decode(String),
    #[error("chat completion response had no message content")]
    MissingContent,
}

/// One conversation to complete: system prompt, prior turns, then the current query as the
/// final user turn.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub history: &'a [ConversationMessage],
    pub query: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Returns the first completion's text. Exactly one request per call, no retries.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, RemoteError>;
}

#[derive(Debug, Serialize, PartialEq)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResp {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct TogetherClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl TogetherClient {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build http client")?;

        Ok(Self {
            client,
            api_url: config.together_api_url.clone(),
            api_key: config.together_api_key.clone(),
        })
    }
}

#[async_trait]
impl ChatCompletion for TogetherClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, RemoteError> {
        let api_key = self.api_key.as_deref().ok_or(RemoteError::MissingApiKey)?;

        let body = ChatReq {
            model: request.model,
            messages: build_messages(&request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(
            model = request.model,
            turns = body.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(RemoteError::Transport)?;

        let status = response.status();
        let text = response.text().await.map_err(RemoteError::Transport)?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status,
                body: normalize_err_body(&text),
            });
        }

        parse_completion(&text)
    }
}

fn build_messages<'a>(request: &CompletionRequest<'a>) -> Vec<WireMessage<'a>> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(WireMessage {
        role: "system",
        content: request.system_prompt,
    });
    for turn in request.history {
        messages.push(WireMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        });
    }
    messages.push(WireMessage {
        role: "user",
        content: request.query,
    });
    messages
}

fn parse_completion(body: &str) -> Result<String, RemoteError> {
    let response: ChatResp =
        serde_json::from_str(body).map_err(|err| RemoteError::Decode(err.to_string()))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or(RemoteError::MissingContent)?;

    let content = sanitize_model_output(content);
    if content.is_empty() {
        return Err(RemoteError::MissingContent);
    }
    Ok(content)
}

fn sanitize_model_output(answer: String) -> String {
    let mut text = answer.trim().to_string();
    if text.starts_with("```") {
        let captured = Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```$")
            .ok()
            .and_then(|re| re.captures(&text).and_then(|caps| caps.get(1)))
            .map(|body| body.as_str().trim().to_string());
        text = match captured {
            Some(body) => body,
            None => text.replace("```", "").trim().to_string(),
        };
    }
    text
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let err = json.get("error");
        if let Some(msg) = err.and_then(|v| v.as_str()) {
            return msg.to_string();
        }
        if let Some(msg) = err
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str())
        {
            return msg.to_string();
        }
    }

    trimmed.to_string()
}
