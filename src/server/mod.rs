//! HTTP server providing an OpenAI-compatible API.
//!
//! - [`openai_api`]: Request/response types and route handlers
//! - [`streaming`]: Backend event stream → OpenAI chunk translation
//! - [`decoder`]: Incremental UTF-8 decoding for the translator
//! - [`error`]: Error responses

pub mod decoder;
pub mod error;
pub mod openai_api;
pub mod streaming;
