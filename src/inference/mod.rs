//! Access to the text-generation backend.
//!
//! - [`backend`]: The `InferenceBackend` trait and its request/response types
//! - [`workers_ai`]: REST client for Workers AI (direct or via AI Gateway)
//! - [`aliases`]: Client-facing model name resolution

pub mod aliases;
pub mod backend;
pub mod workers_ai;
