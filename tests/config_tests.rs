//! Configuration file loading.

use std::io::Write;

use workers_ai_openai::config::{Config, DEFAULT_MODEL};

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "server": {{"listen": "127.0.0.1:9000"}},
            "model": {{"aliases": {{"gpt-3.5-turbo": "@cf/mistral/mistral-7b-instruct-v0.1"}}}},
            "backend": {{"account_id": "abc123"}},
            "gateway": {{"id": "prod", "skip_cache": true}}
        }}"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.server.listen, "127.0.0.1:9000");
    assert_eq!(config.model.default_model, DEFAULT_MODEL);
    assert_eq!(
        config.model.aliases["gpt-3.5-turbo"],
        "@cf/mistral/mistral-7b-instruct-v0.1"
    );
    assert_eq!(config.backend.account_id, "abc123");
    assert_eq!(config.gateway.active_id(), Some("prod"));
    assert!(config.gateway.skip_cache);
    assert_eq!(config.gateway.base_url, "https://gateway.ai.cloudflare.com/v1");
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config.model.default_model, DEFAULT_MODEL);
    assert!(config.model.aliases.is_empty());
}

#[test]
fn test_invalid_file_is_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    assert!(Config::load(file.path()).is_err());
}
