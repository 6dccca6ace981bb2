// src/advisory/providers.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{sanitize_advice, AdviceFuture, Advisor, AdvisoryError};
use crate::config::AdvisorConfig;

const USER_AGENT: &str = concat!("carbon-region-advisor/", env!("CARGO_PKG_VERSION"));

fn http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(25))
        .build()?;
    Ok(client)
}

fn transport(e: reqwest::Error) -> AdvisoryError {
    AdvisoryError::Transport(e.to_string())
}

fn require_prompt(prompt: &str) -> Result<(), AdvisoryError> {
    if prompt.trim().is_empty() {
        return Err(AdvisoryError::InvalidInput("empty prompt".to_string()));
    }
    Ok(())
}

/// Read an error body into the structured error, keeping it short.
async fn status_error(resp: reqwest::Response) -> AdvisoryError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message: String = body.chars().take(300).collect();
    AdvisoryError::from_status(status, message)
}

fn finish(text: &str) -> Result<String, AdvisoryError> {
    let cleaned = sanitize_advice(text);
    if cleaned.is_empty() {
        Err(AdvisoryError::EmptyResponse)
    } else {
        Ok(cleaned)
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

// ------------------------------------------------------------
// Anthropic (Messages API)
// ------------------------------------------------------------

pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicProvider {
    pub fn new(cfg: &AdvisorConfig) -> anyhow::Result<Self> {
        if cfg.api_key.trim().is_empty() {
            anyhow::bail!("anthropic api key is empty");
        }
        let model = if cfg.model.is_empty() {
            "claude-3-haiku-20240307".to_string()
        } else {
            cfg.model.clone()
        };
        Ok(Self {
            http: http_client()?,
            api_key: cfg.api_key.clone(),
            model,
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }
}

impl Advisor for AnthropicProvider {
    fn advise<'a>(&'a self, prompt: &'a str) -> AdviceFuture<'a> {
        Box::pin(async move {
            require_prompt(prompt)?;

            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                max_tokens: u32,
                temperature: f32,
                messages: Vec<Msg<'a>>,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                content: Vec<Block>,
            }
            #[derive(Deserialize)]
            struct Block {
                #[serde(default)]
                text: Option<String>,
            }

            let req = Req {
                model: &self.model,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                messages: vec![Msg {
                    role: "user",
                    content: prompt,
                }],
            };

            let resp = self
                .http
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&req)
                .send()
                .await
                .map_err(transport)?;

            if !resp.status().is_success() {
                return Err(status_error(resp).await);
            }
            let body: Resp = resp.json().await.map_err(transport)?;
            let text = body
                .content
                .into_iter()
                .find_map(|b| b.text)
                .unwrap_or_default();
            finish(&text)
        })
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

// ------------------------------------------------------------
// OpenAI (Chat Completions API)
// ------------------------------------------------------------

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(cfg: &AdvisorConfig) -> anyhow::Result<Self> {
        if cfg.api_key.trim().is_empty() {
            anyhow::bail!("openai api key is empty");
        }
        let model = if cfg.model.is_empty() {
            "gpt-4o-mini".to_string()
        } else {
            cfg.model.clone()
        };
        Ok(Self {
            http: http_client()?,
            api_key: cfg.api_key.clone(),
            model,
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }
}

impl Advisor for OpenAiProvider {
    fn advise<'a>(&'a self, prompt: &'a str) -> AdviceFuture<'a> {
        Box::pin(async move {
            require_prompt(prompt)?;

            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let req = Req {
                model: &self.model,
                messages: vec![Msg {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(transport)?;

            if !resp.status().is_success() {
                return Err(status_error(resp).await);
            }
            let body: Resp = resp.json().await.map_err(transport)?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .unwrap_or("");
            finish(content)
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Local advisors (disabled / tests)
// ------------------------------------------------------------

/// Always fails with `AdvisoryError::Disabled`.
pub struct DisabledAdvisor;

impl Advisor for DisabledAdvisor {
    fn advise<'a>(&'a self, _prompt: &'a str) -> AdviceFuture<'a> {
        Box::pin(async { Err(AdvisoryError::Disabled) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns a fixed text; counts calls.
#[derive(Debug, Default)]
pub struct MockAdvisor {
    fixed: String,
    calls: AtomicUsize,
}

impl MockAdvisor {
    pub fn new(fixed: impl Into<String>) -> Self {
        Self {
            fixed: fixed.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Advisor for MockAdvisor {
    fn advise<'a>(&'a self, prompt: &'a str) -> AdviceFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            require_prompt(prompt)?;
            finish(&self.fixed)
        })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Always fails with the given error.
#[derive(Debug)]
pub struct FailingAdvisor {
    err: AdvisoryError,
}

impl FailingAdvisor {
    pub fn new(err: AdvisoryError) -> Self {
        Self { err }
    }
}

impl Advisor for FailingAdvisor {
    fn advise<'a>(&'a self, _prompt: &'a str) -> AdviceFuture<'a> {
        let err = self.err.clone();
        Box::pin(async move { Err(err) })
    }
    fn provider_name(&self) -> &'static str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_and_failing_return_errors() {
        assert_eq!(DisabledAdvisor.advise("x").await, Err(AdvisoryError::Disabled));
        let f = FailingAdvisor::new(AdvisoryError::Transport("reset".into()));
        assert_eq!(f.advise("x").await.unwrap_err().kind(), "transport_error");
    }

    #[tokio::test]
    async fn mock_rejects_empty_prompt_and_counts_calls() {
        let m = MockAdvisor::new("  Prefer FR.  ");
        assert_eq!(m.advise("prompt").await.unwrap(), "Prefer FR.");
        assert!(matches!(m.advise("   ").await, Err(AdvisoryError::InvalidInput(_))));
        assert_eq!(m.calls(), 2);
    }

    #[test]
    fn providers_need_a_key() {
        let cfg = AdvisorConfig {
            enabled: true,
            ..AdvisorConfig::default()
        };
        assert!(AnthropicProvider::new(&cfg).is_err());
        assert!(OpenAiProvider::new(&cfg).is_err());
    }
}
