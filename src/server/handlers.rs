//! Request handlers: the chat proxy, model listing, config store access,
//! health, and server-side edit application.

use axum::{
    Json,
    extract::State,
    http::header,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tracing::{debug, info};

use crate::chat::{ChatEvent, ChatProxyRequest, augment, prompt};
use crate::core::patch::{DiagramEdit, apply_edits};
use crate::provider::{self, StreamEvent};
use crate::store::{ApiConfig, fetch_models};

use super::{ApiError, ApiResult, AppState};

/// Health probe.
pub async fn status_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// `POST /api/chat` - validate, bind a provider, augment context, and
/// republish the upstream stream as SSE.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatProxyRequest>,
) -> ApiResult<Response> {
    let config = request
        .api_config
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("Missing apiConfig"))?;

    if config.api_key.trim().is_empty() {
        return Err(ApiError::bad_request("Missing API key"));
    }
    if config.provider.trim().is_empty() {
        return Err(ApiError::bad_request("Missing provider"));
    }
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("messages must not be empty"));
    }

    let binding = provider::bind(&state.settings, &config.provider, &config.api_key)?;
    let model = config
        .resolved_model()
        .ok_or_else(|| ApiError::bad_request(format!("unsupported provider: {}", config.provider)))?;

    info!(provider = %config.provider, %model, turns = request.messages.len(), "proxying chat turn");

    let provider_request = provider::ProviderRequest {
        model,
        system: prompt::SYSTEM_PROMPT.to_string(),
        messages: augment(&request.messages, &request.xml),
        tools: prompt::diagram_tools(),
        temperature: 0.0,
    };

    let mut rx = binding.stream_chat(provider_request).await?;

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Done => {
                    yield Ok::<_, Infallible>(Event::default().data("[DONE]"));
                    break;
                }
                other => {
                    let chat_event = to_chat_event(other);
                    let payload = serde_json::to_string(&chat_event).unwrap_or_default();
                    yield Ok(Event::default().data(payload));
                }
            }
        }
    };

    let sse = Sse::new(stream).keep_alive(KeepAlive::default());
    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        sse,
    )
        .into_response())
}

/// Translate a provider stream event into the client-facing wire event.
fn to_chat_event(event: StreamEvent) -> ChatEvent {
    match event {
        StreamEvent::TextDelta(delta) => ChatEvent::TextDelta { delta },
        StreamEvent::Text { text, tool } => ChatEvent::Text {
            text,
            tool: tool.map(Into::into),
        },
        StreamEvent::ToolCallStart { call_id, name } => ChatEvent::ToolCallStart { call_id, name },
        StreamEvent::ToolCallDelta {
            call_id,
            arguments_delta,
        } => ChatEvent::ToolCallDelta {
            call_id,
            delta: arguments_delta,
        },
        StreamEvent::ToolCallEnd { call_id } => ChatEvent::ToolCallEnd { call_id },
        StreamEvent::Error(error) => ChatEvent::Error {
            error: if error.is_empty() {
                "unknown error".into()
            } else {
                error
            },
        },
        // Done never reaches here; the stream loop terminates on it first.
        StreamEvent::Done => ChatEvent::Error {
            error: "unexpected end of stream".into(),
        },
    }
}

/// `POST /api/models` - fetch the model list for the supplied credentials.
/// Failures are soft: the client keeps its previous list and shows the error.
pub async fn models_handler(
    State(state): State<AppState>,
    Json(config): Json<ApiConfig>,
) -> ApiResult<Json<serde_json::Value>> {
    if config.provider.trim().is_empty() {
        return Err(ApiError::bad_request("Missing provider"));
    }
    if config.api_key.trim().is_empty() {
        return Err(ApiError::bad_request("Missing API key"));
    }

    let models = fetch_models(&state.settings, &config).await.map_err(|e| {
        debug!("model list fetch failed: {}", e);
        match e {
            provider::ProviderError::Unsupported(_) => ApiError::from(e),
            provider::ProviderError::Upstream { .. } => ApiError::from(e),
            provider::ProviderError::Transport(err) => ApiError::bad_gateway(err.to_string()),
        }
    })?;

    Ok(Json(json!({ "models": models })))
}

/// `GET /api/config` - load the persisted configuration (never fails).
pub async fn get_config_handler(State(state): State<AppState>) -> Json<ApiConfig> {
    Json(state.store.load())
}

/// `PUT /api/config` - persist the configuration verbatim.
pub async fn put_config_handler(
    State(state): State<AppState>,
    Json(config): Json<ApiConfig>,
) -> ApiResult<Json<ApiConfig>> {
    state.store.save(&config).map_err(ApiError::internal)?;
    Ok(Json(config))
}

#[derive(Debug, Deserialize)]
pub struct ApplyEditsRequest {
    #[serde(default)]
    pub xml: String,
    #[serde(default)]
    pub edits: Vec<DiagramEdit>,
}

/// `POST /api/diagram/edits` - apply edit_diagram patches server-side.
/// Unmatched steps are reported by index so the client can fall back to a
/// full display_diagram replacement.
pub async fn apply_edits_handler(
    Json(request): Json<ApplyEditsRequest>,
) -> Json<crate::core::patch::EditOutcome> {
    Json(apply_edits(&request.xml, &request.edits))
}
