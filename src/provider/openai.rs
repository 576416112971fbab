//! OpenAI-compatible Chat Completions binding.
//!
//! Serves both the `openai` and `openrouter` provider ids; they speak the
//! same wire protocol and differ only in base URL. Streams with
//! `stream: true` and decodes SSE frames with `core::SseDecoder`.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::chat::{ChatMessage, MessagePart};
use crate::core::SseDecoder;

use super::{
    ChatProvider, ProviderError, ProviderId, ProviderRequest, ProviderSettings, StreamEvent,
    ToolDefinition, upstream_error_message,
};

pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    name: &'static str,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn openai(settings: &ProviderSettings, api_key: &str) -> Self {
        Self::with_base(settings, ProviderId::OpenAi, api_key)
    }

    pub fn openrouter(settings: &ProviderSettings, api_key: &str) -> Self {
        Self::with_base(settings, ProviderId::OpenRouter, api_key)
    }

    fn with_base(settings: &ProviderSettings, id: ProviderId, api_key: &str) -> Self {
        Self {
            client: settings.http.clone(),
            name: id.as_str(),
            base_url: settings.base_url(id).to_string(),
            api_key: api_key.to_string(),
            timeout: settings.request_timeout,
        }
    }

    /// Flatten proxy messages into the Chat Completions shape. Turns with
    /// image parts become array content; text-only turns stay plain strings.
    fn build_messages(request: &ProviderRequest) -> Vec<WireMessage> {
        let mut messages = vec![WireMessage {
            role: "system".into(),
            content: Value::String(request.system.clone()),
        }];

        for msg in &request.messages {
            messages.push(WireMessage {
                role: msg.role.clone(),
                content: wire_content(msg),
            });
        }

        messages
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
        tools
            .iter()
            .map(|t| WireTool {
                tool_type: "function".into(),
                function: WireFunction {
                    name: t.name.into(),
                    description: Some(t.description.into()),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Decode the upstream SSE stream and forward events. Tracks parallel
    /// tool calls by index so interleaved argument deltas stay separated.
    async fn process_stream(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
        struct InFlightCall {
            id: String,
            name: String,
            started: bool,
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut calls: HashMap<usize, InFlightCall> = HashMap::new();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    break;
                }
            };

            for frame in decoder.push(&chunk) {
                if frame.is_done() {
                    continue;
                }
                let Some(parsed) = frame.try_parse::<StreamChunk>() else {
                    continue;
                };

                for choice in parsed.choices {
                    let delta = choice.delta;

                    if let Some(content) = delta.content
                        && !content.is_empty()
                    {
                        let _ = tx.send(StreamEvent::TextDelta(content)).await;
                    }

                    if let Some(tool_calls) = delta.tool_calls {
                        for tc in tool_calls {
                            let call = calls.entry(tc.index).or_insert_with(|| InFlightCall {
                                id: String::new(),
                                name: String::new(),
                                started: false,
                            });
                            if let Some(id) = tc.id {
                                call.id = id;
                            }
                            if let Some(name) = tc.function.as_ref().and_then(|f| f.name.clone()) {
                                call.name = name;
                            }
                            if !call.started && !call.id.is_empty() && !call.name.is_empty() {
                                call.started = true;
                                let _ = tx
                                    .send(StreamEvent::ToolCallStart {
                                        call_id: call.id.clone(),
                                        name: call.name.clone(),
                                    })
                                    .await;
                            }
                            if let Some(args) =
                                tc.function.as_ref().and_then(|f| f.arguments.clone())
                                && !args.is_empty()
                                && call.started
                            {
                                let _ = tx
                                    .send(StreamEvent::ToolCallDelta {
                                        call_id: call.id.clone(),
                                        arguments_delta: args,
                                    })
                                    .await;
                            }
                        }
                    }

                    if choice.finish_reason.is_some() {
                        for (_, call) in calls.drain() {
                            if call.started {
                                let _ = tx.send(StreamEvent::ToolCallEnd { call_id: call.id }).await;
                            }
                        }
                    }
                }
            }
        }

        let _ = tx.send(StreamEvent::Done).await;
    }
}

/// Content for one wire message: a plain string, or an array of typed parts
/// when the turn carries images.
fn wire_content(msg: &ChatMessage) -> Value {
    let has_files = msg
        .parts
        .iter()
        .any(|p| matches!(p, MessagePart::File { .. }));

    if !has_files {
        return Value::String(msg.text());
    }

    let parts: Vec<Value> = msg
        .parts
        .iter()
        .map(|p| match p {
            MessagePart::Text { text } => json!({ "type": "text", "text": text }),
            MessagePart::File { url, .. } => {
                json!({ "type": "image_url", "image_url": { "url": url } })
            }
        })
        .collect();
    Value::Array(parts)
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn stream_chat(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        let body = CompletionRequest {
            model: request.model.clone(),
            messages: Self::build_messages(&request),
            tools: Some(Self::convert_tools(&request.tools)),
            stream: true,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let req = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(self.timeout);

        let (tx, rx) = mpsc::channel(100);
        let provider = self.name;

        tokio::spawn(async move {
            match req.send().await {
                Ok(response) if response.status().is_success() => {
                    Self::process_stream(response, tx).await;
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    let message = upstream_error_message(status, &text);
                    tracing::error!(provider, %status, "upstream error: {}", message);
                    let _ = tx
                        .send(StreamEvent::Error(format!(
                            "{provider} API error {status}: {message}"
                        )))
                        .await;
                    let _ = tx.send(StreamEvent::Done).await;
                }
                Err(e) => {
                    tracing::error!(provider, "request failed: {}", e);
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    let _ = tx.send(StreamEvent::Done).await;
                }
            }
        });

        Ok(rx)
    }
}

// ============================================================================
// Chat Completions wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    stream: bool,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: Value,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
