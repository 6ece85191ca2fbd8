//! Engine configuration.

use serde::Deserialize;

use crate::domain::key::Environment;

/// Defaults applied when a create request leaves a field unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default key prefix (e.g. `sk`).
    pub default_prefix: String,
    /// Default key environment.
    pub default_environment: Environment,
    /// Byte count for the random portion of generated keys.
    pub default_key_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_prefix: "sk".to_string(),
            default_environment: Environment::Test,
            default_key_length: 32,
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional `keywarden` config file and
    /// `KEYWARDEN_*` environment variables. Unset fields keep their
    /// defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("keywarden").required(false))
            .add_source(config::Environment::with_prefix("KEYWARDEN"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_prefix, "sk");
        assert_eq!(config.default_environment, Environment::Test);
        assert_eq!(config.default_key_length, 32);
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"default_prefix": "pk"}"#).unwrap();
        assert_eq!(config.default_prefix, "pk");
        assert_eq!(config.default_key_length, 32);
    }
}
