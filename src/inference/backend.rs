//! The inference backend seam.
//!
//! Handlers talk to the model service only through [`InferenceBackend`], so
//! tests can swap in an in-process backend and the HTTP layer never sees
//! transport details.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Raw byte stream returned by a streaming run.
pub type ByteStream = BoxStream<'static, Result<Bytes, BackendError>>;

/// Errors raised while calling the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure (connect, TLS, body read).
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an error status or an unsuccessful envelope.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The backend answered with a body we could not interpret.
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

/// AI Gateway routing for a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOptions {
    pub id: String,
    pub skip_cache: bool,
}

/// Per-call options forwarded opaquely to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub gateway: Option<GatewayOptions>,
}

/// One chat message, forwarded verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// Any other fields (`tool_call_id`, `name`, `tool_calls`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(Value::String(content.into())),
            extra: serde_json::Map::new(),
        }
    }
}

/// Chat request body as sent to the backend.
///
/// Optional generation parameters are omitted unless the caller supplied them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatBody {
    pub stream: bool,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

/// Request body for a backend call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RunBody {
    Chat(ChatBody),
    /// Raw prompt. Usually a string; other shapes are left for the backend to judge.
    Prompt { prompt: Value },
}

/// Aggregate result of a blocking run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<Value>>,
}

/// A text-generation service.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run the model and return its raw event stream.
    async fn run_streaming(
        &self,
        model: &str,
        body: &RunBody,
        options: &RunOptions,
    ) -> Result<ByteStream, BackendError>;

    /// Run the model and wait for the whole result.
    async fn run_blocking(
        &self,
        model: &str,
        body: &RunBody,
        options: &RunOptions,
    ) -> Result<RunResult, BackendError>;
}
