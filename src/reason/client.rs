//! Reasoning-service clients: a chat-completions HTTP client and a scripted
//! mock for tests and offline runs.

use crate::config::ReasonerConfig;
use crate::error::TriageError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Opaque text-reasoning boundary: one prompt in, structured text or an
/// error out.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn reason(&self, prompt: &str) -> Result<String, TriageError>;
}

// ---------------------------------------------------------------------------
// HTTP client (chat-completions style)
// ---------------------------------------------------------------------------

pub struct HttpReasoner {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    api_key: Option<String>,
}

impl HttpReasoner {
    pub fn new(config: &ReasonerConfig) -> Option<Self> {
        let endpoint = config.endpoint.clone()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .ok()?;
        Some(Self {
            http,
            endpoint,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            api_key: std::env::var("AUTOSEC_REASONER_KEY").ok(),
        })
    }
}

#[async_trait]
impl ReasoningService for HttpReasoner {
    async fn reason(&self, prompt: &str) -> Result<String, TriageError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ]
        });

        let mut req = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TriageError::ReasoningUnavailable(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(TriageError::ReasoningUnavailable(format!(
                "service returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(TriageError::ReasoningMalformed(format!(
                "service returned {status}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| TriageError::ReasoningMalformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TriageError::ReasoningMalformed("empty choices".into()))
    }
}

const SYSTEM_PROMPT: &str = "You are a security analyst. Answer with a single \
JSON object and nothing else.";

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Stand-in when no endpoint is configured. Every call is unavailable, so
/// every assessment degrades.
pub struct DisabledReasoner;

#[async_trait]
impl ReasoningService for DisabledReasoner {
    async fn reason(&self, _prompt: &str) -> Result<String, TriageError> {
        Err(TriageError::ReasoningUnavailable(
            "no reasoning endpoint configured".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Scripted mock
// ---------------------------------------------------------------------------

/// One scripted reply from the mock service.
pub enum MockReply {
    Text(String),
    Unavailable,
    Malformed,
}

pub struct MockReasoner {
    script: Mutex<VecDeque<MockReply>>,
    prompts: Mutex<Vec<String>>,
}

impl MockReasoner {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: MockReply) {
        self.script.lock().expect("mock lock").push_back(reply);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(MockReply::Text(text.into()));
    }

    /// Number of reason() calls made so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("mock lock").len()
    }

    /// Prompts received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("mock lock").clone()
    }
}

impl Default for MockReasoner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningService for MockReasoner {
    async fn reason(&self, prompt: &str) -> Result<String, TriageError> {
        self.prompts
            .lock()
            .expect("mock lock")
            .push(prompt.to_string());

        match self.script.lock().expect("mock lock").pop_front() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Unavailable) | None => Err(TriageError::ReasoningUnavailable(
                "mock service offline".into(),
            )),
            Some(MockReply::Malformed) => Ok("this is not json".to_string()),
        }
    }
}
