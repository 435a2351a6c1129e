//! Client-facing model names mapped to backend model ids.

use std::collections::HashMap;

/// Static alias table. Lookups that miss return the input unchanged.
#[derive(Debug, Clone, Default)]
pub struct ModelAliases {
    aliases: HashMap<String, String>,
    default_model: String,
}

impl ModelAliases {
    pub fn new(aliases: HashMap<String, String>, default_model: impl Into<String>) -> Self {
        Self {
            aliases,
            default_model: default_model.into(),
        }
    }

    /// Map an alias to its backend id, or pass the name through on a miss.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Resolve an optional request model, using the default when absent or empty.
    pub fn resolve_requested<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(name) if !name.is_empty() => self.resolve(name),
            _ => &self.default_model,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// All (alias, backend id) pairs, sorted by alias.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self
            .aliases
            .iter()
            .map(|(alias, id)| (alias.as_str(), id.as_str()))
            .collect();
        entries.sort_unstable();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> ModelAliases {
        let mut map = HashMap::new();
        map.insert("gpt-4".to_string(), "@cf/meta/llama-3.1-8b-instruct".to_string());
        ModelAliases::new(map, "@cf/default")
    }

    #[test]
    fn test_hit_and_miss() {
        let aliases = aliases();
        assert_eq!(aliases.resolve("gpt-4"), "@cf/meta/llama-3.1-8b-instruct");
        assert_eq!(aliases.resolve("@cf/other"), "@cf/other");
    }

    #[test]
    fn test_missing_model_uses_default() {
        let aliases = aliases();
        assert_eq!(aliases.resolve_requested(None), "@cf/default");
        assert_eq!(aliases.resolve_requested(Some("")), "@cf/default");
        assert_eq!(
            aliases.resolve_requested(Some("gpt-4")),
            "@cf/meta/llama-3.1-8b-instruct"
        );
    }
}
