//! Workers AI REST client.
//!
//! Calls `{base}/accounts/{account}/ai/run/{model}` directly, or
//! `{gateway_base}/{account}/{gateway}/workers-ai/{model}` when a gateway is
//! selected for the call.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::inference::backend::{
    BackendError, ByteStream, InferenceBackend, RunBody, RunOptions, RunResult,
};

const SKIP_CACHE_HEADER: &str = "cf-aig-skip-cache";

/// Response envelope wrapping every blocking Workers AI result.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Option<RunResult>,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    errors: Vec<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    message: String,
}

fn default_success() -> bool {
    true
}

/// Workers AI client.
pub struct WorkersAiClient {
    http: Client,
    account_id: String,
    api_token: String,
    base_url: String,
    gateway_base_url: String,
}

impl WorkersAiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: Client::new(),
            account_id: config.backend.account_id.clone(),
            api_token: config.backend.api_token.clone(),
            base_url: config.backend.base_url.trim_end_matches('/').to_string(),
            gateway_base_url: config.gateway.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint for a model, honoring gateway routing.
    pub fn endpoint(&self, model: &str, options: &RunOptions) -> String {
        match &options.gateway {
            Some(gateway) => format!(
                "{}/{}/{}/workers-ai/{}",
                self.gateway_base_url, self.account_id, gateway.id, model
            ),
            None => format!(
                "{}/accounts/{}/ai/run/{}",
                self.base_url, self.account_id, model
            ),
        }
    }

    fn request(&self, model: &str, body: &RunBody, options: &RunOptions) -> RequestBuilder {
        let url = self.endpoint(model, options);
        debug!(url = %url, "Calling backend");

        let mut request = self.http.post(url).bearer_auth(&self.api_token).json(body);
        if let Some(gateway) = &options.gateway {
            if gateway.skip_cache {
                request = request.header(SKIP_CACHE_HEADER, "true");
            }
        }
        request
    }

    async fn check_status(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Envelope>(&text)
            .ok()
            .and_then(|env| env.errors.into_iter().next())
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(text);

        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl InferenceBackend for WorkersAiClient {
    async fn run_streaming(
        &self,
        model: &str,
        body: &RunBody,
        options: &RunOptions,
    ) -> Result<ByteStream, BackendError> {
        let response = self.request(model, body, options).send().await?;
        let response = Self::check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(BackendError::from))
            .boxed())
    }

    async fn run_blocking(
        &self,
        model: &str,
        body: &RunBody,
        options: &RunOptions,
    ) -> Result<RunResult, BackendError> {
        let response = self.request(model, body, options).send().await?;
        let response = Self::check_status(response).await?;
        let status = response.status().as_u16();

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        if !envelope.success {
            let message = envelope
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(BackendError::Api { status, message });
        }

        envelope
            .result
            .ok_or_else(|| BackendError::Decode("missing result".to_string()))
    }
}
