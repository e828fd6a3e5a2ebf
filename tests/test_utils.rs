//! Test utilities for marketpulse integration tests

use async_trait::async_trait;
use marketpulse::error::{MarketPulseError, Result};
use marketpulse::llm::{ChatOutcome, ChatRequest, LlmClient};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted provider reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Successful call returning this content
    Content(String),
    /// Successful call with blank content
    Blank,
    /// Provider-side failure with this HTTP status
    Fail(u16),
}

impl ScriptedReply {
    pub fn json(text: &str) -> Self {
        Self::Content(text.to_string())
    }
}

/// LlmClient double that replays a script and records every request.
///
/// When the script runs out, the fallback reply repeats forever, so a
/// test can script the interesting prefix and leave the steady state
/// implicit.
pub struct ScriptedClient {
    script: Mutex<VecDeque<ScriptedReply>>,
    fallback: ScriptedReply,
    pub calls: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new(fallback: ScriptedReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(fallback: ScriptedReply, script: Vec<ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn recorded_models(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.model.clone())
            .collect()
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        self.calls.lock().unwrap().last().and_then(|request| {
            request
                .messages
                .iter()
                .find(|m| m.role == "user")
                .map(|m| m.content.clone())
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome> {
        self.calls.lock().unwrap().push(request);

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            ScriptedReply::Content(content) => Ok(ChatOutcome {
                request_id: "scripted".into(),
                content: Some(content),
                usage: None,
                duration_ms: 1,
            }),
            ScriptedReply::Blank => Ok(ChatOutcome {
                request_id: "scripted".into(),
                content: Some("   ".into()),
                usage: None,
                duration_ms: 1,
            }),
            ScriptedReply::Fail(status) => Err(MarketPulseError::Provider {
                status,
                body: "scripted failure".into(),
            }),
        }
    }
}

/// Install a test subscriber once so RUST_LOG=debug surfaces pipeline logs
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Service config with millisecond retry/guard delays so degradation
/// paths stay fast under test.
pub fn fast_config() -> marketpulse::config::ServiceConfig {
    let mut config = marketpulse::config::ServiceConfig::default();
    config.retry = marketpulse::llm::RetryPolicy {
        max_retries: 1,
        initial_delay: Duration::from_millis(1),
        backoff_factor: 2.0,
    };
    config.guard = marketpulse::llm::EmptyResponseGuard {
        max_retries: 2,
        delay: Duration::from_millis(1),
    };
    config
}
