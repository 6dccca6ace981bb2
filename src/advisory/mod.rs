//! Advisory adapter: provider abstraction + structured errors + sanitization.
//! Turns a scoring summary prompt into short human-readable guidance.

pub mod prompt;
pub mod providers;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::config::AdvisorConfig;
pub use providers::{AnthropicProvider, DisabledAdvisor, FailingAdvisor, MockAdvisor, OpenAiProvider};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Longest advisory text kept after sanitization.
pub const MAX_ADVICE_CHARS: usize = 1200;

/// Failure of an advisory call. Never corrupts cached scoring state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdvisoryError {
    #[error("advisory service is disabled")]
    Disabled,

    /// The request itself was unusable (empty prompt, provider rejected it).
    #[error("invalid advisory request: {0}")]
    InvalidInput(String),

    #[error("advisory service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("advisory transport error: {0}")]
    Transport(String),

    #[error("advisory call timed out after {0}s")]
    Timeout(u64),

    #[error("advisory service returned no text")]
    EmptyResponse,

    /// The cycle failed before the advisor was called.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AdvisoryError {
    /// Stable machine-readable code for API responses and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AdvisoryError::Disabled => "disabled",
            AdvisoryError::InvalidInput(_) => "invalid_input",
            AdvisoryError::Service { .. } => "service_error",
            AdvisoryError::Transport(_) => "transport_error",
            AdvisoryError::Timeout(_) => "timeout",
            AdvisoryError::EmptyResponse => "empty_response",
            AdvisoryError::Internal(_) => "internal",
        }
    }

    /// Worth retrying on the next tick (as opposed to a malformed request).
    pub fn is_transient(&self) -> bool {
        match self {
            AdvisoryError::Service { status, .. } => *status == 429 || *status >= 500,
            AdvisoryError::Transport(_) | AdvisoryError::Timeout(_) | AdvisoryError::EmptyResponse => true,
            AdvisoryError::Disabled | AdvisoryError::InvalidInput(_) | AdvisoryError::Internal(_) => {
                false
            }
        }
    }

    /// Map an HTTP error status: 4xx other than 429 means the request was bad.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) && status != 429 {
            AdvisoryError::InvalidInput(format!("{status}: {message}"))
        } else {
            AdvisoryError::Service { status, message }
        }
    }
}

pub type AdviceFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AdvisoryError>> + Send + 'a>>;

/// Trait object used by the orchestrator and handlers.
pub trait Advisor: Send + Sync {
    /// Produce guidance text for `prompt`.
    fn advise<'a>(&'a self, prompt: &'a str) -> AdviceFuture<'a>;
    /// Provider name for diagnostics/responses.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynAdvisor = Arc<dyn Advisor>;

/// Factory: build an advisor according to config and environment variables.
///
/// * `AI_TEST_MODE=mock` → deterministic mock advisor.
/// * `AI_TEST_MODE=error` → advisor that always fails with a service error.
/// * `enabled == false` → disabled advisor.
/// * otherwise the configured provider (`anthropic` | `openai`).
pub fn build_advisor(config: &AdvisorConfig) -> DynAdvisor {
    match std::env::var("AI_TEST_MODE").as_deref() {
        Ok("mock") => {
            return Arc::new(MockAdvisor::new("Run in the lowest-carbon region (mock)."));
        }
        Ok("error") => {
            let err = AdvisoryError::Service {
                status: 503,
                message: "mock outage".to_string(),
            };
            return Arc::new(FailingAdvisor::new(err));
        }
        _ => {}
    }

    if !config.enabled {
        return Arc::new(DisabledAdvisor);
    }

    match config.provider.as_str() {
        "anthropic" | "claude" => match AnthropicProvider::new(config) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                tracing::warn!(error = %e, "anthropic advisor unavailable, advisory disabled");
                Arc::new(DisabledAdvisor)
            }
        },
        "openai" => match OpenAiProvider::new(config) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                tracing::warn!(error = %e, "openai advisor unavailable, advisory disabled");
                Arc::new(DisabledAdvisor)
            }
        },
        other => {
            tracing::warn!(provider = other, "unknown advisory provider, advisory disabled");
            Arc::new(DisabledAdvisor)
        }
    }
}

// ------------------------------------------------------------
// Sanitization
// ------------------------------------------------------------

/// Drop control characters, collapse runs of spaces, keep line breaks
/// (max one blank line), trim, and cap at `MAX_ADVICE_CHARS`.
pub fn sanitize_advice(input: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for raw in input.lines() {
        let mut line = String::with_capacity(raw.len());
        let mut prev_space = false;
        for ch in raw.chars() {
            let c = if ch == '\t' { ' ' } else { ch };
            if c.is_control() {
                continue;
            }
            if c == ' ' {
                if !prev_space && !line.is_empty() {
                    line.push(' ');
                }
                prev_space = true;
            } else {
                line.push(c);
                prev_space = false;
            }
        }
        let line = line.trim_end().to_string();
        if line.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let joined = lines.join("\n");
    if joined.chars().count() > MAX_ADVICE_CHARS {
        joined.chars().take(MAX_ADVICE_CHARS).collect::<String>().trim_end().to_string()
    } else {
        joined
    }
}
