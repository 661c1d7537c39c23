//! OpenAI-compatible chat completions decision collaborator.

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use armlink_core::{DecisionSettings, Error, Result};

use crate::client::Observation;
use crate::decision::DecisionMaker;

const SYSTEM_PROMPT: &str = "You operate a touch screen through a robot arm. \
Analyze the screenshot and the user's question, then answer with one compact JSON object \
as instructed. Do not add any other text.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// [`DecisionMaker`] backed by a chat completions endpoint.
#[derive(Debug)]
pub struct ChatCompletionsDecider {
    client: reqwest::Client,
    settings: DecisionSettings,
    history: VecDeque<Value>,
}

impl ChatCompletionsDecider {
    /// Create a decider from decision settings.
    pub fn new(settings: DecisionSettings) -> Result<Self> {
        reqwest::Url::parse(&settings.endpoint).map_err(|e| {
            Error::Config(format!(
                "invalid decision endpoint '{}': {e}",
                settings.endpoint
            ))
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            settings,
            history: VecDeque::new(),
        })
    }

    /// Forget previous exchanges.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Messages currently kept as history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn push_history(&mut self, role: &str, content: Value) {
        if !self.settings.use_history {
            return;
        }
        self.history
            .push_back(json!({ "role": role, "content": content }));
        // One exchange is a user and an assistant message
        let max_messages = self.settings.history_size.max(1) * 2;
        while self.history.len() > max_messages {
            self.history.pop_front();
        }
    }

    fn request_body(&self, user_content: &Value) -> Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": [{ "type": "text", "text": SYSTEM_PROMPT }],
        })];
        if self.settings.use_history {
            messages.extend(self.history.iter().cloned());
        }
        messages.push(json!({ "role": "user", "content": user_content }));

        json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "messages": messages,
            "max_tokens": self.settings.max_tokens,
        })
    }

    async fn post(&self, body: &Value) -> Result<String> {
        let mut request = self.client.post(&self.settings.endpoint).json(body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            if let Ok(parsed) = serde_json::from_str::<ChatResponse>(&text) {
                if let Some(choice) = parsed.choices.into_iter().next() {
                    return Ok(choice.message.content);
                }
            }
        }
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .ok()
            .and_then(|e| e.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("unexpected response ({status})"));
        Err(Error::Decision(message))
    }
}

/// Encode a JPEG as a `data:` URL.
pub fn jpeg_data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

#[async_trait]
impl DecisionMaker for ChatCompletionsDecider {
    async fn decide(&mut self, prompt: &str, observation: &Observation) -> Result<String> {
        let user_content = json!([
            { "type": "text", "text": prompt },
            { "type": "image_url", "image_url": { "url": jpeg_data_url(observation.jpeg()) } },
        ]);
        let body = self.request_body(&user_content);

        let attempts = self.settings.attempts();
        let mut wait = self.settings.retry_wait();
        let mut last_error = Error::Decision("no attempts made".to_string());
        for attempt in 1..=attempts {
            match self.post(&body).await {
                Ok(text) => {
                    debug!("Decision text: {}", text);
                    self.push_history("user", user_content);
                    self.push_history("assistant", Value::String(text.clone()));
                    return Ok(text);
                }
                Err(e) => {
                    warn!(
                        "Decision request attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    last_error = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(wait).await;
                wait *= 2;
            }
        }
        Err(last_error)
    }
}
