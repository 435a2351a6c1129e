//! Translation of the backend event stream into OpenAI chunk frames.
//!
//! The backend emits newline-delimited `data: {...}` lines carrying text
//! fragments in `response`, marks its last substantive event with a `usage`
//! object, and ends with `data: [DONE]`. Models that answer with a tool call
//! do so as plain JSON text spread over many fragments, so nothing is
//! forwarded as content until the usage-marked event: at that point the whole
//! accumulated text is classified once as either tool calls or plain text.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::inference::backend::{BackendError, ByteStream};
use crate::server::decoder::Utf8Decoder;

const DATA_PREFIX: &str = "data: ";
const DONE_TOKEN: &str = "[DONE]";
const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Streaming chat completion chunk (OpenAI-compatible).
#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice {
    pub index: usize,
    pub delta: ChunkDelta,
    pub logprobs: Option<Value>,
    pub finish_reason: Option<String>,
}

/// Serializes to `{}` when neither field is set.
#[derive(Debug, Default, Serialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub index: usize,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// One decoded backend record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEvent {
    pub response_fragment: String,
    /// Set on the backend's final substantive event.
    pub usage_marker: bool,
}

#[derive(Debug, Deserialize)]
struct BackendPayload {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    usage: Option<Value>,
}

/// Interpretation of one complete backend line.
#[derive(Debug)]
pub enum BackendLine {
    /// Not a data line.
    Ignored,
    /// The termination sentinel.
    Done,
    Event(BackendEvent),
    /// A data line whose payload is not valid JSON. Dropped, stream continues.
    Malformed(serde_json::Error),
}

impl BackendLine {
    pub fn parse(line: &str) -> Self {
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Self::Ignored;
        };
        if payload.trim() == DONE_TOKEN {
            return Self::Done;
        }
        match serde_json::from_str::<BackendPayload>(payload) {
            Ok(p) => Self::Event(BackendEvent {
                response_fragment: p.response.unwrap_or_default(),
                usage_marker: p.usage.is_some(),
            }),
            Err(e) => Self::Malformed(e),
        }
    }
}

/// What the accumulated text turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

impl Classification {
    /// Classify the full accumulated response text.
    ///
    /// A JSON object yields one tool call, a JSON array one per element.
    /// Anything else, including JSON scalars, is plain text.
    pub fn of(accumulated: &str, new_call_id: fn() -> String) -> Self {
        match serde_json::from_str::<Value>(accumulated) {
            Ok(Value::Array(calls)) => Self::ToolCalls(
                calls
                    .iter()
                    .enumerate()
                    .map(|(index, call)| tool_call(index, call, new_call_id()))
                    .collect(),
            ),
            Ok(call @ Value::Object(_)) => Self::ToolCalls(vec![tool_call(0, &call, new_call_id())]),
            _ => Self::Text(accumulated.to_string()),
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::ToolCalls(_))
    }

    fn into_delta(self) -> ChunkDelta {
        match self {
            Self::Text(content) => ChunkDelta {
                content: Some(content),
                tool_calls: None,
            },
            Self::ToolCalls(calls) => ChunkDelta {
                content: None,
                tool_calls: Some(calls),
            },
        }
    }
}

fn tool_call(index: usize, call: &Value, id: String) -> ToolCall {
    let name = call
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let arguments = call
        .get("parameters")
        .or_else(|| call.get("arguments"))
        .map(Value::to_string)
        .unwrap_or_else(|| "{}".to_string());

    ToolCall {
        index,
        id,
        kind: "function".to_string(),
        function: FunctionCall { name, arguments },
    }
}

/// Fresh `call_<uuid>` identifier.
pub fn new_call_id() -> String {
    format!("call_{}", Uuid::new_v4())
}

/// Per-response translator state. One instance per streaming request.
pub struct StreamTranslator {
    id: String,
    created: u64,
    model: String,
    decoder: Utf8Decoder,
    buffer: String,
    argument_string: String,
    saw_any_event: bool,
    classified: bool,
    classified_as_tool_call: bool,
    finished: bool,
    skipped_frames: usize,
    new_call_id: fn() -> String,
}

impl StreamTranslator {
    pub fn new(id: impl Into<String>, created: u64, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created,
            model: model.into(),
            decoder: Utf8Decoder::new(),
            buffer: String::new(),
            argument_string: String::new(),
            saw_any_event: false,
            classified: false,
            classified_as_tool_call: false,
            finished: false,
            skipped_frames: 0,
            new_call_id,
        }
    }

    /// Replace the tool call id generator.
    pub fn with_call_ids(mut self, new_call_id: fn() -> String) -> Self {
        self.new_call_id = new_call_id;
        self
    }

    /// Feed one chunk of raw backend bytes, returning any complete output frames.
    pub fn transform(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(&['\r', '\n']);

            match BackendLine::parse(line) {
                BackendLine::Ignored => {}
                BackendLine::Done => {
                    frames.push(Bytes::from_static(DONE_FRAME));
                    self.finished = true;
                    self.buffer.clear();
                    break;
                }
                BackendLine::Malformed(e) => {
                    self.skipped_frames += 1;
                    warn!(error = %e, line, "Dropping malformed backend frame");
                }
                BackendLine::Event(event) => {
                    let chunk = self.translate(event);
                    match serde_json::to_string(&chunk) {
                        Ok(json) => frames.push(Bytes::from(format!("{DATA_PREFIX}{json}\n\n"))),
                        Err(e) => warn!(error = %e, "Failed to serialize chunk"),
                    }
                }
            }
        }

        frames
    }

    fn translate(&mut self, event: BackendEvent) -> ChatCompletionChunk {
        let mut delta = ChunkDelta::default();
        let mut finish_reason = None;

        if !self.classified {
            self.argument_string.push_str(&event.response_fragment);

            if event.usage_marker {
                let classification = Classification::of(&self.argument_string, self.new_call_id);
                self.classified = true;
                self.classified_as_tool_call = classification.is_tool_call();
                debug!(
                    tool_call = self.classified_as_tool_call,
                    chars = self.argument_string.len(),
                    "Classified streamed response"
                );

                // A stream whose only event is the final one never reports tool_calls.
                if self.saw_any_event && self.classified_as_tool_call {
                    finish_reason = Some("tool_calls".to_string());
                }
                delta = classification.into_delta();
            }
        }

        self.saw_any_event = true;

        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                logprobs: None,
                finish_reason,
            }],
        }
    }

    /// Called when the upstream ends. Returns how many bytes were left
    /// unprocessed (a line with no terminator, or a truncated codepoint).
    pub fn finish(&mut self) -> usize {
        let dropped = if self.finished {
            0
        } else {
            self.buffer.len() + self.decoder.pending_bytes()
        };
        if dropped > 0 {
            warn!(
                dropped_bytes = dropped,
                truncated_codepoint = self.decoder.pending_bytes() > 0,
                "Backend stream ended mid-line"
            );
        }
        self.decoder.finish();
        self.buffer.clear();
        dropped
    }

    /// Whether the termination sentinel has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of malformed data lines dropped so far.
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// All response text accumulated so far.
    pub fn accumulated_text(&self) -> &str {
        &self.argument_string
    }
}

/// Pipe a backend byte stream through a translator.
///
/// The output ends right after `[DONE]`, without waiting for the upstream to
/// close. A transport error is passed through and ends the output.
pub fn translate_stream(
    upstream: ByteStream,
    translator: StreamTranslator,
) -> impl Stream<Item = Result<Bytes, BackendError>> + Send + 'static {
    stream::unfold(Some((upstream, translator)), |state| async move {
        let (mut upstream, mut translator) = state?;
        if translator.is_finished() {
            return None;
        }

        match upstream.next().await {
            Some(Ok(bytes)) => {
                let frames: Vec<Result<Bytes, BackendError>> =
                    translator.transform(&bytes).into_iter().map(Ok).collect();
                Some((frames, Some((upstream, translator))))
            }
            Some(Err(e)) => {
                warn!(error = %e, "Backend stream failed");
                Some((vec![Err(e)], None))
            }
            None => {
                translator.finish();
                None
            }
        }
    })
    .flat_map(stream::iter)
}
