//! OpenAI-compatible HTTP API.
//!
//! Implements the subset of the OpenAI API served by this bridge:
//! - POST /v1/chat/completions
//! - POST /v1/completions
//! - GET /v1/models
//! - GET /health

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::inference::aliases::ModelAliases;
use crate::inference::backend::{
    ChatBody, ChatMessage, GatewayOptions, InferenceBackend, RunBody, RunOptions,
};
use crate::server::error::ApiError;
use crate::server::streaming::{translate_stream, StreamTranslator};

/// Application state shared across handlers.
pub struct AppState {
    pub backend: Arc<dyn InferenceBackend>,
    pub aliases: ModelAliases,
    pub options: RunOptions,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: &Config) -> Self {
        let gateway = config.gateway.active_id().map(|id| GatewayOptions {
            id: id.to_string(),
            skip_cache: config.gateway.skip_cache,
        });

        Self {
            backend,
            aliases: ModelAliases::new(
                config.model.aliases.clone(),
                config.model.default_model.clone(),
            ),
            options: RunOptions { gateway },
            start_time: Instant::now(),
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/completions", post(completions))
        .route("/v1/models", get(list_models))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Chat completion request (OpenAI-compatible).
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub n: Option<u32>,
    #[serde(default)]
    pub stop: Option<Value>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    #[serde(default)]
    pub frequency_penalty: Option<f64>,
    #[serde(default)]
    pub tools: Option<Vec<Value>>,
}

impl ChatCompletionRequest {
    /// Build the backend body, failing if there is nothing to send.
    pub fn into_body(self) -> Result<ChatBody, ApiError> {
        let messages = self.messages.unwrap_or_default();
        if messages.is_empty() {
            return Err(ApiError::NoMessages);
        }

        Ok(ChatBody {
            stream: self.stream.unwrap_or(false),
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
            n: self.n,
            stop: self.stop,
            max_tokens: self.max_tokens,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
            tools: self.tools,
        })
    }
}

/// Chat completion response (non-streaming).
#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: usize,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

#[derive(Debug, Serialize)]
pub struct AssistantMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
}

/// Completion request (non-chat).
#[derive(Debug, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<Value>,
}

impl CompletionRequest {
    /// The prompt to forward, or `None` when it is absent, null or empty.
    pub fn non_empty_prompt(self) -> Option<Value> {
        match self.prompt? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::Array(items) if items.is_empty() => None,
            prompt => Some(prompt),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct CompletionChoice {
    pub index: usize,
    pub text: Option<String>,
    pub logprobs: Option<Value>,
    pub finish_reason: String,
}

/// Token accounting. Always zero: the backend does not report usage we trust.
#[derive(Debug, Default, Serialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Model listing response.
#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// Identifier and timestamp fixed for the lifetime of one response.
#[derive(Debug, Clone)]
pub struct ResponseIdentity {
    pub id: String,
    pub created: u64,
}

impl ResponseIdentity {
    pub fn new(prefix: &str) -> Self {
        Self {
            id: format!("{prefix}-{}", Uuid::new_v4()),
            created: unix_timestamp(),
        }
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let identity = ResponseIdentity::new("chatcmpl");
    let model = state
        .aliases
        .resolve_requested(req.model.as_deref())
        .to_string();
    let body = req.into_body()?;

    info!(
        request_id = identity.id,
        model = model,
        messages = body.messages.len(),
        stream = body.stream,
        "Chat completion request"
    );

    let stream = body.stream;
    let body = RunBody::Chat(body);

    if stream {
        let upstream = state
            .backend
            .run_streaming(&model, &body, &state.options)
            .await?;
        let translator = StreamTranslator::new(identity.id, identity.created, model);
        let body = Body::from_stream(translate_stream(upstream, translator));

        return Ok((
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response());
    }

    let result = state
        .backend
        .run_blocking(&model, &body, &state.options)
        .await?;

    let response = ChatCompletionResponse {
        id: identity.id,
        object: "chat.completion".to_string(),
        created: identity.created,
        model,
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: result.response.filter(|r| !r.is_empty()),
                tool_calls: result.tool_calls,
            },
            finish_reason: "stop".to_string(),
        }],
        usage: Usage::default(),
    };

    Ok(Json(response).into_response())
}

async fn completions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let Json(req) = payload?;
    let identity = ResponseIdentity::new("cmpl");
    let model = state
        .aliases
        .resolve_requested(req.model.as_deref())
        .to_string();

    let prompt = req.non_empty_prompt().ok_or(ApiError::NoPrompt)?;

    info!(
        request_id = identity.id,
        model = model,
        prompt_is_text = prompt.is_string(),
        "Completion request"
    );

    let result = state
        .backend
        .run_blocking(&model, &RunBody::Prompt { prompt }, &state.options)
        .await?;

    Ok(Json(CompletionResponse {
        id: identity.id,
        object: "text_completion".to_string(),
        created: identity.created,
        model,
        choices: vec![CompletionChoice {
            index: 0,
            text: result.response,
            logprobs: None,
            finish_reason: "stop".to_string(),
        }],
        usage: Usage::default(),
    }))
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let default_model = state.aliases.default_model();
    let mut data = vec![ModelInfo {
        id: default_model.to_string(),
        object: "model".to_string(),
        created: 0,
        owned_by: default_model.to_string(),
    }];
    data.extend(state.aliases.entries().into_iter().map(|(alias, id)| ModelInfo {
        id: alias.to_string(),
        object: "model".to_string(),
        created: 0,
        owned_by: id.to_string(),
    }));

    Json(ModelList {
        object: "list".to_string(),
        data,
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
