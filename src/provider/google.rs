//! Google Gemini binding (`streamGenerateContent?alt=sse`).
//!
//! Gemini delivers function calls whole rather than as argument deltas, so
//! each one is republished as a start/delta/end triple with a synthesized
//! call id to match the shared stream shape.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::chat::MessagePart;
use crate::core::SseDecoder;

use super::{
    ChatProvider, ProviderError, ProviderId, ProviderRequest, ProviderSettings, StreamEvent,
    ToolDefinition, upstream_error_message,
};

pub struct GoogleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl GoogleProvider {
    pub fn new(settings: &ProviderSettings, api_key: &str) -> Self {
        Self {
            client: settings.http.clone(),
            base_url: settings.base_url(ProviderId::Google).to_string(),
            api_key: api_key.to_string(),
            timeout: settings.request_timeout,
        }
    }

    /// Map proxy messages to Gemini contents. Only user/assistant turns carry
    /// over; the assistant role is "model" on this API. Image parts become
    /// `inlineData` parts decoded from their data URLs.
    fn build_contents(request: &ProviderRequest) -> Vec<GeminiContent> {
        let mut contents = Vec::new();
        for msg in &request.messages {
            let role = match msg.role.as_str() {
                "user" => "user",
                "assistant" => "model",
                _ => continue,
            };
            let text = msg.text();
            let mut parts = Vec::new();
            if !text.is_empty() {
                parts.push(GeminiPart::Text { text });
            }
            for part in &msg.parts {
                if let MessagePart::File { url, media_type } = part
                    && let Some(inline) = inline_data_from_url(url, media_type.as_deref())
                {
                    parts.push(GeminiPart::InlineData { inline_data: inline });
                }
            }
            if parts.is_empty() {
                continue;
            }
            contents.push(GeminiContent {
                role: role.into(),
                parts,
            });
        }
        contents
    }

    fn build_tools(tools: &[ToolDefinition]) -> Option<Vec<GeminiTool>> {
        if tools.is_empty() {
            return None;
        }
        Some(vec![GeminiTool {
            function_declarations: tools
                .iter()
                .map(|t| GeminiFunctionDeclaration {
                    name: t.name.into(),
                    description: t.description.into(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }])
    }
}

#[async_trait]
impl ChatProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn stream_chat(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, ProviderError> {
        let body = GeminiRequest {
            contents: Self::build_contents(&request),
            system_instruction: Some(GeminiSystemInstruction {
                parts: vec![GeminiPart::Text {
                    text: request.system.clone(),
                }],
            }),
            tools: Self::build_tools(&request.tools),
            generation_config: Some(GeminiGenerationConfig {
                temperature: request.temperature,
            }),
        };

        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, request.model, self.api_key
        );
        let req = self.client.post(&url).json(&body).timeout(self.timeout);

        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            match req.send().await {
                Ok(response) if response.status().is_success() => {
                    let mut stream = response.bytes_stream();
                    let mut decoder = SseDecoder::new();
                    let mut call_count = 0usize;

                    while let Some(chunk) = stream.next().await {
                        let chunk = match chunk {
                            Ok(c) => c,
                            Err(e) => {
                                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                                break;
                            }
                        };

                        for frame in decoder.push(&chunk) {
                            let Some(parsed) = frame.try_parse::<GeminiResponse>() else {
                                continue;
                            };
                            for candidate in parsed.candidates.unwrap_or_default() {
                                for part in candidate.content.parts {
                                    if let Some(text) = part.text {
                                        let _ = tx.send(StreamEvent::TextDelta(text)).await;
                                    }
                                    if let Some(fc) = part.function_call {
                                        let call_id = format!("google_{call_count}");
                                        call_count += 1;
                                        let _ = tx
                                            .send(StreamEvent::ToolCallStart {
                                                call_id: call_id.clone(),
                                                name: fc.name,
                                            })
                                            .await;
                                        let _ = tx
                                            .send(StreamEvent::ToolCallDelta {
                                                call_id: call_id.clone(),
                                                arguments_delta: fc.args.to_string(),
                                            })
                                            .await;
                                        let _ =
                                            tx.send(StreamEvent::ToolCallEnd { call_id }).await;
                                    }
                                }
                            }
                        }
                    }

                    let _ = tx.send(StreamEvent::Done).await;
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    let message = upstream_error_message(status, &text);
                    tracing::error!(%status, "Gemini upstream error: {}", message);
                    let _ = tx
                        .send(StreamEvent::Error(format!(
                            "google API error {status}: {message}"
                        )))
                        .await;
                    let _ = tx.send(StreamEvent::Done).await;
                }
                Err(e) => {
                    tracing::error!("Gemini request failed: {}", e);
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    let _ = tx.send(StreamEvent::Done).await;
                }
            }
        });

        Ok(rx)
    }
}

// ============================================================================
// Gemini wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

/// Decode a `data:<mime>;base64,<payload>` URL into an inline data part.
/// Non-data URLs have no Gemini equivalent here and are skipped.
fn inline_data_from_url(url: &str, media_type: Option<&str>) -> Option<GeminiInlineData> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime_type = media_type
        .map(str::to_string)
        .unwrap_or_else(|| meta.trim_end_matches(";base64").to_string());
    Some(GeminiInlineData {
        mime_type,
        data: data.to_string(),
    })
}

#[derive(Debug, Serialize)]
struct GeminiTool {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GeminiCandidateContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Value,
}
