//! workers-ai-openai: OpenAI-compatible endpoints for Workers AI models.
//!
//! Accepts OpenAI-style chat and completion requests, forwards them to a
//! Workers AI text-generation model, and reshapes the results (including
//! streamed output and tool calls the model emits as plain JSON text) into
//! the OpenAI response format.

pub mod config;
pub mod inference;
pub mod server;
