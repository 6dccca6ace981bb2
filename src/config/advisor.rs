// src/config/advisor.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const ENV_ADVISOR_PATH: &str = "ADVISOR_CONFIG_PATH";
pub const DEFAULT_ADVISOR_PATH: &str = "config/advisor.json";

fn default_max_tokens() -> u32 {
    300
}
fn default_temperature() -> f32 {
    0.4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    pub enabled: bool,
    /// "anthropic" | "openai" (case-insensitive)
    pub provider: String,
    /// Provider model id; empty means the provider's default.
    #[serde(default)]
    pub model: String,
    /// "ENV" means: read from ANTHROPIC_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "anthropic".to_string(),
            model: String::new(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl AdvisorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::parse(&data)
    }

    /// $ADVISOR_CONFIG_PATH, then config/advisor.json. A missing file means
    /// "advisory disabled"; a present but broken file is an error.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = env::var(ENV_ADVISOR_PATH).unwrap_or_else(|_| DEFAULT_ADVISOR_PATH.to_string());
        if !Path::new(&path).exists() {
            tracing::info!(path = %path, "no advisor config found, advisory disabled");
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    fn parse(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AdvisorConfig = serde_json::from_str(data)?;

        // Normalize provider
        cfg.provider = cfg.provider.trim().to_lowercase();

        // Resolve api key if "ENV". A disabled advisor needs no key, and a
        // missing key disables the advisor instead of failing startup.
        if cfg.enabled && cfg.api_key.trim().eq_ignore_ascii_case("env") {
            let var = match cfg.provider.as_str() {
                "anthropic" | "claude" => Some("ANTHROPIC_API_KEY"),
                "openai" => Some("OPENAI_API_KEY"),
                _ => None,
            };
            cfg.api_key = var
                .and_then(|v| env::var(v).ok())
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_default();
            if cfg.api_key.is_empty() {
                tracing::warn!(
                    provider = %cfg.provider,
                    env_var = var.unwrap_or("-"),
                    "advisor api key not available, advisory disabled"
                );
                cfg.enabled = false;
            }
        } else if !cfg.enabled && cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key.clear();
        }

        // Sanitize sampling params
        if !(0.0..=1.0).contains(&cfg.temperature) {
            cfg.temperature = default_temperature();
        }
        if cfg.max_tokens == 0 {
            cfg.max_tokens = default_max_tokens();
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sanitizes() {
        let cfg = AdvisorConfig::parse(
            r#"{"enabled":true,"provider":" OpenAI ","api_key":"sk-test","temperature":7.0,"max_tokens":0}"#,
        )
        .unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.temperature, 0.4);
        assert_eq!(cfg.max_tokens, 300);
    }

    #[serial_test::serial]
    #[test]
    fn env_key_resolution() {
        env::set_var("ANTHROPIC_API_KEY", "from-env");
        let cfg =
            AdvisorConfig::parse(r#"{"enabled":true,"provider":"anthropic","api_key":"ENV"}"#)
                .unwrap();
        assert_eq!(cfg.api_key, "from-env");
        assert!(cfg.enabled);
        env::remove_var("ANTHROPIC_API_KEY");

        // missing key disables instead of failing
        let cfg =
            AdvisorConfig::parse(r#"{"enabled":true,"provider":"anthropic","api_key":"env"}"#)
                .unwrap();
        assert!(!cfg.enabled);
        assert!(cfg.api_key.is_empty());

        let cfg = AdvisorConfig::parse(r#"{"enabled":true,"provider":"bard","api_key":"ENV"}"#)
            .unwrap();
        assert!(!cfg.enabled);
    }

    #[serial_test::serial]
    #[test]
    fn disabled_config_skips_key_lookup() {
        env::remove_var("OPENAI_API_KEY");
        let cfg =
            AdvisorConfig::parse(r#"{"enabled":false,"provider":"openai","api_key":"ENV"}"#)
                .unwrap();
        assert!(!cfg.enabled);
        assert!(cfg.api_key.is_empty());
    }

    #[serial_test::serial]
    #[test]
    fn shipped_config_loads_without_keys() {
        env::remove_var("ANTHROPIC_API_KEY");
        env::remove_var("OPENAI_API_KEY");
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_ADVISOR_PATH);
        let cfg = AdvisorConfig::load_from_file(&path).unwrap();
        assert!(!cfg.enabled);
    }
}
