//! Sampling settings carried by every generation request.

use serde::Deserialize;
use serde_json::Value;

/// Sampling configuration sent with every generation request.
///
/// Deserializable so hosts can keep it next to their own settings; missing
/// fields fall back to the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Provider-specific options merged into the request (Ollama `options`).
    pub options: Option<Value>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 8192,
            options: None,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_llm_config_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 8192);
        assert!(config.options.is_none());
    }

    #[test]
    fn test_llm_config_builder() {
        let config = LlmConfig::default()
            .with_temperature(0.3)
            .with_max_tokens(4096)
            .with_options(json!({"seed": 7}));
        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.options.unwrap()["seed"], 7);
    }

    #[test]
    fn test_llm_config_deserialize_partial() {
        let config: LlmConfig = serde_json::from_str(r#"{"temperature": 0.2}"#).unwrap();
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, 8192);
    }
}
