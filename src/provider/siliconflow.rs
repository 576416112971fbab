//! SiliconFlow divergent binding.
//!
//! This endpoint is not wire-compatible with the shared streaming tool-call
//! protocol, so the binding makes one blocking completions call and
//! synthesizes a two-event stream. Tool intent is detected by finding the
//! first fenced block literally labeled `xml` in the completion text; that
//! heuristic is deliberately exact, not generalized. Clients of this
//! provider parse the tagged payload themselves - no true tool-call events
//! are ever emitted here.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{
    ChatProvider, ProviderError, ProviderId, ProviderRequest, ProviderSettings, StreamEvent,
    upstream_error_message,
};

/// First fenced block labeled exactly `xml`.
static FENCED_XML: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```xml\s*\n(.*?)```").expect("fenced xml regex"));

pub struct SiliconFlowProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl SiliconFlowProvider {
    pub fn new(settings: &ProviderSettings, api_key: &str) -> Self {
        Self {
            client: settings.http.clone(),
            base_url: settings.base_url(ProviderId::SiliconFlow).to_string(),
            api_key: api_key.to_string(),
            timeout: settings.request_timeout,
        }
    }

    /// Flat role/content messages; content is stringified when the turn is
    /// not plain text.
    fn build_messages(request: &ProviderRequest) -> Vec<FlatMessage> {
        let mut messages = vec![FlatMessage {
            role: "system".into(),
            content: request.system.clone(),
        }];
        for msg in &request.messages {
            messages.push(FlatMessage {
                role: msg.role.clone(),
                content: msg.text(),
            });
        }
        messages
    }
}

/// Split a completion into the synthetic event the client receives: diagram
/// XML tagged for `display_diagram` when a fenced xml block is present,
/// otherwise the raw text.
fn synthesize_event(content: &str) -> StreamEvent {
    match FENCED_XML.captures(content) {
        Some(caps) => StreamEvent::Text {
            text: caps[1].trim().to_string(),
            tool: Some("display_diagram"),
        },
        None => StreamEvent::Text {
            text: content.to_string(),
            tool: None,
        },
    }
}

#[async_trait]
impl ChatProvider for SiliconFlowProvider {
    fn name(&self) -> &'static str {
        "siliconflow"
    }

    async fn stream_chat(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        let body = CompletionRequest {
            model: request.model.clone(),
            messages: Self::build_messages(&request),
            stream: false,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream {
                provider: "siliconflow",
                status: status.as_u16(),
                message: upstream_error_message(status, &text),
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let content = completion
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default();

        let event = synthesize_event(content);

        let (tx, rx) = mpsc::channel(4);
        // Both sends succeed; the channel is empty and larger than the event count.
        let _ = tx.send(event).await;
        let _ = tx.send(StreamEvent::Done).await;

        Ok(rx)
    }
}

// ============================================================================
// SiliconFlow wire types (OpenAI-compatible completions, non-streaming)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<FlatMessage>,
    stream: bool,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct FlatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    role: Option<Value>,
}
