//! Runtime configuration for workers-ai-openai.
//!
//! Configuration is loaded from a JSON file and then overlaid with environment
//! variables, so secrets can stay out of the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "@cf/meta/llama-3.3-70b-instruct-fp8-fast";

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "workers-ai-openai",
    about = "OpenAI-compatible API in front of Workers AI"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address. Overrides `server.listen` from the config file.
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Model selection.
    pub model: ModelConfig,

    /// Workers AI account and credentials.
    pub backend: BackendConfig,

    /// Optional AI Gateway routing.
    pub gateway: GatewayConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Model defaults and the alias table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Backend model id used when the request omits `model`.
    pub default_model: String,

    /// Client-facing name → backend model id (e.g. "gpt-4o" → "@cf/...").
    pub aliases: HashMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            aliases: HashMap::new(),
        }
    }
}

/// Workers AI REST settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Cloudflare account id.
    pub account_id: String,

    /// API token sent as a bearer credential.
    pub api_token: String,

    /// REST API root.
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            api_token: String::new(),
            base_url: "https://api.cloudflare.com/client/v4".to_string(),
        }
    }
}

/// AI Gateway settings. Requests go direct to Workers AI unless `id` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway id. `None` or an empty string disables the gateway.
    pub id: Option<String>,

    /// Ask the gateway to bypass its response cache.
    pub skip_cache: bool,

    /// Gateway API root.
    pub base_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            id: None,
            skip_cache: false,
            base_url: "https://gateway.ai.cloudflare.com/v1".to_string(),
        }
    }
}

impl GatewayConfig {
    /// The gateway id, if one is configured and non-empty.
    pub fn active_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(account_id) = var("CLOUDFLARE_ACCOUNT_ID") {
            self.backend.account_id = account_id;
        }
        if let Some(token) = var("CLOUDFLARE_API_TOKEN") {
            self.backend.api_token = token;
        }
        if let Some(id) = var("GATEWAY_ID") {
            self.gateway.id = Some(id);
        }
        if let Some(skip) = var("GATEWAY_SKIP_CACHE") {
            self.gateway.skip_cache = matches!(skip.trim(), "1" | "true" | "TRUE" | "True");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.model.default_model, DEFAULT_MODEL);
        assert_eq!(cfg.server.listen, "0.0.0.0:8080");
        assert!(cfg.gateway.active_id().is_none());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"model":{"aliases":{"gpt-4":"@cf/x/y"}}}"#).unwrap();
        assert_eq!(cfg.model.default_model, DEFAULT_MODEL);
        assert_eq!(cfg.model.aliases["gpt-4"], "@cf/x/y");
        assert_eq!(cfg.backend.base_url, "https://api.cloudflare.com/client/v4");
    }

    #[test]
    fn test_empty_gateway_id_is_inactive() {
        let mut cfg = Config::default();
        cfg.gateway.id = Some(String::new());
        assert!(cfg.gateway.active_id().is_none());
    }

    #[test]
    fn test_env_overlay() {
        let mut cfg = Config::default();
        cfg.apply_vars(|key| match key {
            "CLOUDFLARE_ACCOUNT_ID" => Some("acct".to_string()),
            "GATEWAY_ID" => Some("gw".to_string()),
            "GATEWAY_SKIP_CACHE" => Some("true".to_string()),
            _ => None,
        });
        assert_eq!(cfg.backend.account_id, "acct");
        assert!(cfg.backend.api_token.is_empty());
        assert_eq!(cfg.gateway.active_id(), Some("gw"));
        assert!(cfg.gateway.skip_cache);
    }
}
